//! Dispatcher runtime.
//!
//! The engine keeps its own [`BuildingState`] behind a mutex. One tokio task applies every
//! inbound telemetry message to it; the decision loop locks only long enough to clone it,
//! then plans on the private copy and publishes the resulting commands.
//!
//! ### Lifecycle
//! 1. [`DispatchEngine::bootstrap`] waits for the retained building shape, builds the
//!    model, starts the updater and runs the snapshot handshake.
//! 2. [`DispatchEngine::run`] ticks forever, re-running the handshake whenever the bus
//!    session changes.
//!
//! Everything arrives on a single subscription to the whole building, so telemetry
//! published before the snapshot acknowledgment has been applied by the time the
//! acknowledgment is seen.

use crate::building::{BuildingError, BuildingState};
use crate::bus::topics::{self, ElevatorField, Topic, TopicError, TopicScheme};
use crate::bus::{Bus, BusError, BusMessage, Subscription};
use crate::config;
use crate::dispatch::algorithm::{self, Command};
use crate::print;

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;


/// Errors confined to one inbound message or one tick.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[allow(missing_docs)]
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Model(#[from] BuildingError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Bus(#[from] BusError),
}


/// What [`apply_message`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A telemetry value was stored
    Updated,
    /// The bridge finished a snapshot
    SnapshotDone,
    /// Not telemetry (shape, commands, requests)
    Ignored,
}


/// Applies one telemetry message to `building`.
///
/// The payload is decoded before anything is stored, and every index is checked by the
/// model, so a rejected message leaves `building` untouched.
pub fn apply_message(building: &mut BuildingState, scheme: &TopicScheme, msg: &BusMessage) -> Result<Applied, DispatchError> {
    let payload = msg.payload.as_str();
    match scheme.parse(&msg.topic)? {
        Topic::Elevator(e, field) => {
            match field {
                ElevatorField::Direction => building.set_direction(e, topics::parse_direction(payload)?)?,
                ElevatorField::DoorStatus => building.set_door_status(e, topics::parse_door_status(payload)?)?,
                ElevatorField::TargetFloor => building.set_target_floor(e, topics::parse_index(payload)?)?,
                ElevatorField::CurrentFloor => building.set_current_floor(e, topics::parse_index(payload)?)?,
                ElevatorField::Acceleration => building.set_acceleration(e, topics::parse_int(payload)?)?,
                ElevatorField::Speed => building.set_speed(e, topics::parse_int(payload)?)?,
                ElevatorField::CurrentHeight => building.set_current_height(e, topics::parse_int(payload)?)?,
                ElevatorField::CurrentPassengersWeight => {
                    building.set_current_passengers_weight(e, topics::parse_int(payload)?)?
                }
            }
            Ok(Applied::Updated)
        }
        Topic::FloorRequested(e, f) => {
            building.set_floor_requested(e, f, topics::parse_bool(payload)?)?;
            Ok(Applied::Updated)
        }
        Topic::FloorServiced(e, f) => {
            building.set_floor_to_service(e, f, topics::parse_bool(payload)?)?;
            Ok(Applied::Updated)
        }
        Topic::ButtonUp(f) => {
            building.set_up_button(f, topics::parse_bool(payload)?)?;
            Ok(Applied::Updated)
        }
        Topic::ButtonDown(f) => {
            building.set_down_button(f, topics::parse_bool(payload)?)?;
            Ok(Applied::Updated)
        }
        Topic::SnapshotResponse => {
            if payload.trim() != config::SNAPSHOT_RESPONSE_PAYLOAD {
                return Err(TopicError::BadPayload {
                    payload: payload.to_string(),
                    expected: config::SNAPSHOT_RESPONSE_PAYLOAD,
                }
                .into());
            }
            Ok(Applied::SnapshotDone)
        }
        Topic::NrElevators
        | Topic::NrFloors
        | Topic::ElevatorCapacity(_)
        | Topic::SetTarget(_)
        | Topic::SetCommittedDirection(_)
        | Topic::SnapshotRequest => Ok(Applied::Ignored),
    }
}


/// Waits on `sub` until the elevator count, the floor count and every capacity are known.
///
/// Anything else arriving meanwhile is dropped; the snapshot that follows covers it.
async fn await_building_shape(sub: &mut Subscription, scheme: &TopicScheme) -> anyhow::Result<BuildingState> {
    let mut num_elevators: Option<usize> = None;
    let mut num_floors: Option<usize> = None;
    let mut capacities: HashMap<usize, i32> = HashMap::new();

    loop {
        if let (Some(elevators), Some(floors)) = (num_elevators, num_floors) {
            if (0..elevators).all(|e| capacities.contains_key(&e)) {
                let ordered: Vec<i32> = (0..elevators).map(|e| capacities[&e]).collect();
                return Ok(BuildingState::with_capacities(elevators, floors, &ordered)?);
            }
        }

        let msg = sub.recv().await.ok_or_else(|| anyhow!("bus subscription closed during bootstrap"))?;
        let parsed = match scheme.parse(&msg.topic) {
            Ok(topic) => topic,
            Err(_) => continue,
        };
        let stored = match parsed {
            Topic::NrElevators => topics::parse_index(&msg.payload).map(|n| num_elevators = Some(n)),
            Topic::NrFloors => topics::parse_index(&msg.payload).map(|n| num_floors = Some(n)),
            Topic::ElevatorCapacity(e) => topics::parse_int(&msg.payload).map(|c| {
                capacities.insert(e, c);
            }),
            _ => Ok(()),
        };
        if let Err(e) = stored {
            print::warn(format!("Ignoring {} during bootstrap: {}", msg.topic, e));
        }
    }
}

/// Applies every message from `sub` to `building`, counting snapshot acknowledgments on `acks`.
async fn apply_loop(
    mut sub: Subscription,
    scheme: TopicScheme,
    building: Arc<Mutex<BuildingState>>,
    acks: watch::Sender<u64>,
) {
    while let Some(msg) = sub.recv().await {
        let applied = {
            let mut building = building.lock().await;
            apply_message(&mut building, &scheme, &msg)
        };
        match applied {
            Ok(Applied::SnapshotDone) => acks.send_modify(|n| *n += 1),
            Ok(_) => {}
            Err(e) => print::warn(format!("Dropping telemetry on {}: {}", msg.topic, e)),
        }
    }
    print::warn("Telemetry subscription closed".to_string());
}


/// The dispatcher.
pub struct DispatchEngine<B: Bus> {
    bus: B,
    scheme: TopicScheme,
    building: Arc<Mutex<BuildingState>>,
    acks: watch::Receiver<u64>,
    session: watch::Receiver<u64>,
    interval: Duration,
    snapshot_timeout: Duration,
    updater: JoinHandle<()>,
}

impl<B: Bus> DispatchEngine<B> {
    /// Runs the blocking bootstrap phase.
    ///
    /// ## Steps
    /// 1. Subscribes to every topic of the building.
    /// 2. Waits for the retained elevator count, floor count and capacities.
    /// 3. Builds the model and starts applying telemetry to it.
    /// 4. Requests a snapshot and waits for its acknowledgment, asking again every
    ///    `snapshot_timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bootstrap(bus: B, scheme: TopicScheme, interval: Duration, snapshot_timeout: Duration) -> anyhow::Result<Self> {
        let mut session = bus.session();
        session.borrow_and_update();

        let mut sub = bus.subscribe(&scheme.all()).context("subscribing to building topics")?;
        let building = await_building_shape(&mut sub, &scheme).await?;
        print::info(format!(
            "Dispatcher sees {} elevators and {} floors",
            building.num_elevators(),
            building.num_floors()
        ));

        let building = Arc::new(Mutex::new(building));
        let (ack_tx, acks) = watch::channel(0u64);
        let updater = tokio::spawn(apply_loop(sub, scheme.clone(), building.clone(), ack_tx));

        let mut engine = Self { bus, scheme, building, acks, session, interval, snapshot_timeout, updater };
        engine.request_snapshot().await?;
        Ok(engine)
    }

    /// Handle to the live model, for monitoring.
    pub fn building(&self) -> Arc<Mutex<BuildingState>> {
        self.building.clone()
    }

    /// Requests a full snapshot and waits until it has been applied.
    ///
    /// The request is repeated after every `snapshot_timeout` without acknowledgment.
    /// Fails only if the telemetry updater has stopped.
    pub async fn request_snapshot(&mut self) -> anyhow::Result<()> {
        let topic = self.scheme.topic(&Topic::SnapshotRequest);
        loop {
            self.acks.borrow_and_update();
            match self.bus.publish(&topic, config::SNAPSHOT_REQUEST_PAYLOAD, false) {
                Ok(()) => print::dispatch("Snapshot requested".to_string()),
                Err(e) => print::warn(format!("Could not request snapshot: {e}")),
            }

            match tokio::time::timeout(self.snapshot_timeout, self.acks.changed()).await {
                Ok(Ok(())) => {
                    print::ok("Snapshot received, dispatcher in sync".to_string());
                    return Ok(());
                }
                Ok(Err(_)) => return Err(anyhow!("telemetry updater stopped before snapshot completed")),
                Err(_) => print::warn(format!(
                    "No snapshot acknowledgment within {} ms, asking again",
                    self.snapshot_timeout.as_millis()
                )),
            }
        }
    }

    /// Deep copy of the live model, taken under the lock.
    pub async fn take_snapshot(&self) -> BuildingState {
        self.building.lock().await.clone()
    }

    /// Runs one decision tick and publishes its commands.
    ///
    /// ## Returns
    /// The commands that were published. A failed publish is logged and left out; the
    /// next tick computes it again.
    pub async fn tick(&self) -> Result<Vec<Command>, DispatchError> {
        let mut snapshot = self.take_snapshot().await;
        let commands = algorithm::plan(&mut snapshot)?;

        let mut published = Vec::with_capacity(commands.len());
        for command in commands {
            let (topic, payload) = match command {
                Command::SetTarget { elevator, floor } => (Topic::SetTarget(elevator), floor.to_string()),
                Command::SetCommittedDirection { elevator, direction } => {
                    (Topic::SetCommittedDirection(elevator), direction.code().to_string())
                }
            };
            match self.bus.publish(&self.scheme.topic(&topic), &payload, false) {
                Ok(()) => {
                    print::dispatch(format!("{:?}", command));
                    published.push(command);
                }
                Err(e) => print::err(format!("Could not publish {:?}: {}", command, e)),
            }
        }
        Ok(published)
    }

    /// Ticks forever at the configured interval.
    ///
    /// Before each tick the bus session is checked; after a reconnect the snapshot
    /// handshake runs again, since transient updates may have been missed.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            if self.session.has_changed().unwrap_or(false) {
                self.session.borrow_and_update();
                print::warn("Bus session changed, resynchronising".to_string());
                self.request_snapshot().await?;
            }
            if let Err(e) = self.tick().await {
                print::err(format!("Dispatch tick abandoned: {e}"));
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

impl<B: Bus> Drop for DispatchEngine<B> {
    fn drop(&mut self) {
        self.updater.abort();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::{Direction, DoorStatus};
    use crate::bus::LocalBroker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn publish_shape(broker: &LocalBroker, scheme: &TopicScheme, elevators: usize, floors: usize) {
        broker.publish(&scheme.topic(&Topic::NrElevators), &elevators.to_string(), true).unwrap();
        broker.publish(&scheme.topic(&Topic::NrFloors), &floors.to_string(), true).unwrap();
        for e in 0..elevators {
            broker.publish(&scheme.topic(&Topic::ElevatorCapacity(e)), "10", true).unwrap();
        }
    }

    /// Answers every snapshot request with `telemetry` followed by the acknowledgment.
    fn spawn_responder(broker: &LocalBroker, scheme: &TopicScheme, telemetry: Vec<(Topic, &'static str)>) -> Arc<AtomicUsize> {
        let requests = Arc::new(AtomicUsize::new(0));
        let mut sub = broker.subscribe(&scheme.topic(&Topic::SnapshotRequest)).unwrap();
        let (broker, scheme, counter) = (broker.clone(), scheme.clone(), requests.clone());
        tokio::spawn(async move {
            while sub.recv().await.is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
                for (topic, payload) in &telemetry {
                    let _ = broker.publish(&scheme.topic(topic), payload, false);
                }
                let _ = broker.publish(&scheme.topic(&Topic::SnapshotResponse), "done", false);
            }
        });
        requests
    }

    #[test]
    fn apply_message_updates_and_validates() {
        let scheme = TopicScheme::new("0");
        let mut b = BuildingState::uniform(2, 4, 10);
        let msg = |t: &str, p: &str| BusMessage::new(t, p, false);

        assert_eq!(
            apply_message(&mut b, &scheme, &msg("buildings/0/elevators/1/ElevatorDoorStatus", "1")).unwrap(),
            Applied::Updated
        );
        assert_eq!(b.elevator(1).unwrap().door_status(), DoorStatus::Open);

        apply_message(&mut b, &scheme, &msg("buildings/0/floors/3/ButtonDownPressed", "true")).unwrap();
        assert!(b.down_button(3).unwrap());

        let before = b.clone();
        let rejected = [
            msg("buildings/0/elevators/2/ElevatorSpeed", "5"),
            msg("buildings/0/elevators/0/ElevatorTargetFloor", "4"),
            msg("buildings/0/elevators/0/FloorRequested/9", "true"),
            msg("buildings/0/elevators/0/ElevatorSpeed", "fast"),
            msg("buildings/0/elevators/0/ElevatorDirection", "7"),
            msg("buildings/0/floors/1/ButtonUpPressed", "yes"),
            msg("buildings/0/elevators/0/Bogus", "1"),
        ];
        for m in rejected {
            assert!(apply_message(&mut b, &scheme, &m).is_err(), "{:?} accepted", m);
        }
        assert_eq!(b, before);

        assert_eq!(
            apply_message(&mut b, &scheme, &msg("buildings/0/elevators/0/SetTarget", "2")).unwrap(),
            Applied::Ignored
        );
        assert_eq!(
            apply_message(&mut b, &scheme, &msg("buildings/0/PublishCurrentState/response", "done")).unwrap(),
            Applied::SnapshotDone
        );
    }

    #[tokio::test]
    async fn bootstrap_applies_snapshot_before_returning() {
        let broker = LocalBroker::new();
        let scheme = TopicScheme::new("0");
        publish_shape(&broker, &scheme, 2, 5);
        spawn_responder(
            &broker,
            &scheme,
            vec![
                (Topic::Elevator(1, ElevatorField::CurrentFloor), "3"),
                (Topic::Elevator(1, ElevatorField::DoorStatus), "1"),
                (Topic::ButtonUp(4), "true"),
            ],
        );

        let engine = DispatchEngine::bootstrap(broker.clone(), scheme, config::DISPATCH_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        let snapshot = engine.take_snapshot().await;
        assert_eq!(snapshot.num_elevators(), 2);
        assert_eq!(snapshot.elevator(1).unwrap().current_floor(), 3);
        assert_eq!(snapshot.elevator(1).unwrap().door_status(), DoorStatus::Open);
        assert!(snapshot.up_button(4).unwrap());
    }

    #[tokio::test]
    async fn bootstrap_waits_for_acknowledgment_and_asks_again() {
        let broker = LocalBroker::new();
        let scheme = TopicScheme::new("0");
        publish_shape(&broker, &scheme, 1, 3);
        let mut requests = broker.subscribe(&scheme.topic(&Topic::SnapshotRequest)).unwrap();

        let pending = DispatchEngine::bootstrap(broker.clone(), scheme, config::DISPATCH_INTERVAL, Duration::from_millis(20));
        assert!(tokio::time::timeout(Duration::from_millis(200), pending).await.is_err());

        let mut count = 0;
        while requests.try_recv().is_ok() {
            count += 1;
        }
        assert!(count >= 2, "only {count} requests");
    }

    #[tokio::test]
    async fn tick_publishes_commands_for_changed_values_only() {
        let broker = LocalBroker::new();
        let scheme = TopicScheme::new("0");
        publish_shape(&broker, &scheme, 2, 5);
        spawn_responder(
            &broker,
            &scheme,
            vec![
                (Topic::Elevator(0, ElevatorField::DoorStatus), "1"),
                (Topic::Elevator(1, ElevatorField::DoorStatus), "1"),
                (Topic::FloorServiced(0, 2), "true"),
                (Topic::FloorServiced(1, 2), "true"),
                (Topic::ButtonDown(2), "true"),
            ],
        );
        let engine = DispatchEngine::bootstrap(broker.clone(), scheme.clone(), config::DISPATCH_INTERVAL, TIMEOUT)
            .await
            .unwrap();

        let mut commands = broker.subscribe("buildings/0/elevators/+/SetTarget").unwrap();
        let published = engine.tick().await.unwrap();
        assert_eq!(
            published,
            vec![
                Command::SetCommittedDirection { elevator: 0, direction: Direction::Up },
                Command::SetTarget { elevator: 0, floor: 2 },
            ]
        );
        let msg = commands.recv().await.unwrap();
        assert_eq!(msg, BusMessage::new("buildings/0/elevators/0/SetTarget", "2", false));
    }

    #[tokio::test]
    async fn tick_snapshot_is_isolated_from_later_updates() {
        let broker = LocalBroker::new();
        let scheme = TopicScheme::new("0");
        publish_shape(&broker, &scheme, 1, 4);
        spawn_responder(
            &broker,
            &scheme,
            vec![(Topic::Elevator(0, ElevatorField::DoorStatus), "1"), (Topic::FloorServiced(0, 3), "true")],
        );
        let engine = DispatchEngine::bootstrap(broker.clone(), scheme.clone(), config::DISPATCH_INTERVAL, TIMEOUT)
            .await
            .unwrap();

        let mut snapshot = engine.take_snapshot().await;
        engine.building().lock().await.set_up_button(3, true).unwrap();

        assert!(algorithm::plan(&mut snapshot).unwrap().is_empty());
        assert!(!snapshot.up_button(3).unwrap());
        assert!(engine.take_snapshot().await.up_button(3).unwrap());
    }

    #[tokio::test]
    async fn reconnect_triggers_new_handshake() {
        let broker = LocalBroker::new();
        let scheme = TopicScheme::new("0");
        publish_shape(&broker, &scheme, 1, 3);
        let requests = spawn_responder(&broker, &scheme, Vec::new());

        let engine = DispatchEngine::bootstrap(broker.clone(), scheme, Duration::from_millis(10), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        let running = tokio::spawn(engine.run());
        broker.reconnect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(requests.load(Ordering::SeqCst) >= 2);
        running.abort();
    }
}
