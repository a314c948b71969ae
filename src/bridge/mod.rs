//! ## Telemetry Bridge
//!
//! Keeps the bus's view of the building in lockstep with the controller's.
//!
//! The bridge owns the only connection to the controller. It runs on a dedicated OS thread
//! because every controller call blocks; a [`crossbeam_channel::select!`] loop alternates
//! between polling on a ticker and handling [`BridgeEvent`]s (commands and snapshot
//! requests) forwarded from the bus by the tasks in [`events`]. All controller calls
//! therefore happen on one thread, one at a time.
//!
//! Polling is diff-before-publish: a value is published only when it differs from the
//! bridge's own [`BuildingState`], and is committed to that model only once the publish
//! went through, so a failed publish is retried on the next poll.

pub mod events;

pub use events::{spawn_event_forwarders, BridgeEvent};

use crate::building::{BuildingError, BuildingState, Direction, DoorStatus};
use crate::bus::topics::{encode_bool, ElevatorField, Topic, TopicError, TopicScheme};
use crate::bus::{Bus, BusError};
use crate::config;
use crate::controller::{ControllerError, ElevatorController};
use crate::print;

use anyhow::Context;
use crossbeam_channel as cbc;
use std::time::Duration;
use thiserror::Error;


/// Errors confined to a single value, command or message handled by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[allow(missing_docs)]
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Bus(#[from] BusError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Model(#[from] BuildingError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Topic(#[from] TopicError),
    /// The controller produced a value the model cannot hold.
    #[error("value {0} does not fit the model")]
    InvalidValue(i32),
    /// A message arrived on a topic the bridge does not handle.
    #[error("unexpected topic {0:?}")]
    UnexpectedTopic(String),
}


/// Per-floor boolean values the bridge mirrors.
#[derive(Debug, Clone, Copy)]
enum Flag {
    Requested(usize, usize),
    Serviced(usize, usize),
    Up(usize),
    Down(usize),
}

impl Flag {
    fn topic(self) -> Topic {
        match self {
            Flag::Requested(e, f) => Topic::FloorRequested(e, f),
            Flag::Serviced(e, f) => Topic::FloorServiced(e, f),
            Flag::Up(f) => Topic::ButtonUp(f),
            Flag::Down(f) => Topic::ButtonDown(f),
        }
    }
}


/// Outcome of one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Values that changed and were published
    pub published: usize,
    /// Values skipped because a controller call, publish or model update failed
    pub failed: usize,
}


/// Mirrors one controller onto the bus.
pub struct TelemetryBridge<C: ElevatorController, B: Bus> {
    controller: C,
    bus: B,
    scheme: TopicScheme,
    building: BuildingState,
    poll_interval: Duration,
}

impl<C: ElevatorController, B: Bus> TelemetryBridge<C, B> {
    /// Runs the one-time startup sequence.
    ///
    /// ## Steps
    /// 1. Reads the elevator count and every capacity, and publishes them retained.
    /// 2. Reads the floor count and publishes it retained.
    /// 3. Builds the local [`BuildingState`].
    /// 4. Polls once, so a later snapshot never dumps un-polled defaults.
    ///
    /// Subscribing to commands and snapshot requests is left to
    /// [`spawn_event_forwarders`], called once this returns.
    ///
    /// ## Returns
    /// The started bridge, or an error if the building could not be sized or the
    /// retained values could not be published.
    pub fn start(controller: C, bus: B, scheme: TopicScheme, poll_interval: Duration) -> anyhow::Result<Self> {
        let num_elevators = controller.elevator_num().context("reading elevator count")?;
        let mut capacities = Vec::with_capacity(num_elevators);
        for e in 0..num_elevators {
            capacities.push(controller.elevator_capacity(e).with_context(|| format!("reading capacity of elevator {e}"))?);
        }
        bus.publish(&scheme.topic(&Topic::NrElevators), &num_elevators.to_string(), true)
            .context("publishing elevator count")?;
        for (e, capacity) in capacities.iter().enumerate() {
            bus.publish(&scheme.topic(&Topic::ElevatorCapacity(e)), &capacity.to_string(), true)
                .with_context(|| format!("publishing capacity of elevator {e}"))?;
        }

        let num_floors = controller.floor_num().context("reading floor count")?;
        bus.publish(&scheme.topic(&Topic::NrFloors), &num_floors.to_string(), true)
            .context("publishing floor count")?;

        let building = BuildingState::new(&capacities, num_floors);
        let mut bridge = Self { controller, bus, scheme, building, poll_interval };

        let stats = bridge.poll_once();
        print::ok(format!(
            "Bridge started: {} elevators, {} floors, {} initial values published",
            num_elevators, num_floors, stats.published
        ));
        Ok(bridge)
    }

    /// The bridge's mirror of the controller.
    pub fn building(&self) -> &BuildingState {
        &self.building
    }

    #[allow(missing_docs)]
    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    /// Polls every value once and publishes the ones that changed.
    ///
    /// A failure reading, publishing or storing one value is logged and counted; the
    /// rest of the pass goes on.
    pub fn poll_once(&mut self) -> PollStats {
        let mut stats = PollStats::default();
        let mut record = |name: String, result: Result<bool, BridgeError>| match result {
            Ok(true) => stats.published += 1,
            Ok(false) => {}
            Err(e) => {
                stats.failed += 1;
                print::err(format!("Poll of {name} skipped: {e}"));
            }
        };

        for e in 0..self.building.num_elevators() {
            for field in ElevatorField::ALL {
                record(format!("elevator {e} {}", field.as_str()), self.sync_field(e, field));
            }
            for f in 0..self.building.num_floors() {
                record(format!("elevator {e} FloorRequested {f}"), self.sync_flag(Flag::Requested(e, f)));
                record(format!("elevator {e} FloorServiced {f}"), self.sync_flag(Flag::Serviced(e, f)));
            }
        }
        for f in 0..self.building.num_floors() {
            record(format!("floor {f} ButtonUpPressed"), self.sync_flag(Flag::Up(f)));
            record(format!("floor {f} ButtonDownPressed"), self.sync_flag(Flag::Down(f)));
        }
        stats
    }

    /// Publishes every mirrored value once, then the snapshot acknowledgment.
    ///
    /// The acknowledgment is only sent if every value went out; otherwise the requester
    /// times out and asks again.
    pub fn publish_snapshot(&self) -> Result<(), BridgeError> {
        for e in 0..self.building.num_elevators() {
            for field in ElevatorField::ALL {
                let value = self.model_field(e, field)?;
                self.bus.publish(&self.scheme.topic(&Topic::Elevator(e, field)), &value.to_string(), false)?;
            }
            for f in 0..self.building.num_floors() {
                self.publish_flag(Flag::Requested(e, f), self.model_flag(Flag::Requested(e, f))?)?;
                self.publish_flag(Flag::Serviced(e, f), self.model_flag(Flag::Serviced(e, f))?)?;
            }
        }
        for f in 0..self.building.num_floors() {
            self.publish_flag(Flag::Up(f), self.model_flag(Flag::Up(f))?)?;
            self.publish_flag(Flag::Down(f), self.model_flag(Flag::Down(f))?)?;
        }
        self.bus.publish(&self.scheme.topic(&Topic::SnapshotResponse), config::SNAPSHOT_RESPONSE_PAYLOAD, false)?;
        Ok(())
    }

    /// Executes one event on the controller thread. Failures are logged, never returned.
    pub fn handle_event(&mut self, event: BridgeEvent) {
        let result = match event {
            BridgeEvent::SetTarget { elevator, floor } => {
                print::bridge(format!("Elevator {elevator}: target -> {floor}"));
                self.controller.set_target(elevator, floor).map_err(BridgeError::from)
            }
            BridgeEvent::SetCommittedDirection { elevator, direction } => {
                print::bridge(format!("Elevator {elevator}: direction -> {direction}"));
                self.controller.set_committed_direction(elevator, direction).map_err(BridgeError::from)
            }
            BridgeEvent::SnapshotRequest => {
                print::bridge("Snapshot requested".to_string());
                self.publish_snapshot()
            }
        };
        if let Err(e) = result {
            print::err(format!("Bridge failed to handle {:?}: {}", event, e));
        }
    }

    /// Runs the bridge until the event channel closes.
    ///
    /// Polls on every tick of the configured interval and handles events as they arrive.
    pub fn run(mut self, events: cbc::Receiver<BridgeEvent>) {
        let ticker = cbc::tick(self.poll_interval);
        loop {
            cbc::select! {
                recv(ticker) -> _ => {
                    self.poll_once();
                },
                recv(events) -> event => match event {
                    Ok(event) => self.handle_event(event),
                    Err(_) => {
                        print::warn("Bridge event channel closed, stopping bridge".to_string());
                        return;
                    }
                },
            }
        }
    }

    // ──────────────────────────────────────────────
    //   Scalar fields
    // ──────────────────────────────────────────────

    fn sync_field(&mut self, e: usize, field: ElevatorField) -> Result<bool, BridgeError> {
        let value = self.read_field(e, field)?;
        let previous = self.model_field(e, field)?;
        if value == previous {
            return Ok(false);
        }

        // Storing first validates the value; a failed publish rolls it back
        self.commit_field(e, field, value)?;
        if let Err(err) = self.bus.publish(&self.scheme.topic(&Topic::Elevator(e, field)), &value.to_string(), false) {
            self.commit_field(e, field, previous)?;
            return Err(err.into());
        }
        Ok(true)
    }

    fn read_field(&self, e: usize, field: ElevatorField) -> Result<i32, BridgeError> {
        let c = &self.controller;
        let value = match field {
            ElevatorField::Direction => c.committed_direction(e)?.code(),
            ElevatorField::DoorStatus => c.door_status(e)?.code(),
            ElevatorField::TargetFloor => floor_code(c.target(e)?)?,
            ElevatorField::CurrentFloor => floor_code(c.elevator_floor(e)?)?,
            ElevatorField::Acceleration => c.elevator_accel(e)?,
            ElevatorField::Speed => c.elevator_speed(e)?,
            ElevatorField::CurrentHeight => c.elevator_position(e)?,
            ElevatorField::CurrentPassengersWeight => c.elevator_weight(e)?,
        };
        Ok(value)
    }

    fn model_field(&self, e: usize, field: ElevatorField) -> Result<i32, BridgeError> {
        let el = self.building.elevator(e)?;
        let value = match field {
            ElevatorField::Direction => el.direction().code(),
            ElevatorField::DoorStatus => el.door_status().code(),
            ElevatorField::TargetFloor => floor_code(el.target_floor())?,
            ElevatorField::CurrentFloor => floor_code(el.current_floor())?,
            ElevatorField::Acceleration => el.acceleration(),
            ElevatorField::Speed => el.speed(),
            ElevatorField::CurrentHeight => el.current_height(),
            ElevatorField::CurrentPassengersWeight => el.current_passengers_weight(),
        };
        Ok(value)
    }

    fn commit_field(&mut self, e: usize, field: ElevatorField, value: i32) -> Result<(), BridgeError> {
        let b = &mut self.building;
        match field {
            ElevatorField::Direction => {
                b.set_direction(e, Direction::from_code(value).ok_or(BridgeError::InvalidValue(value))?)?
            }
            ElevatorField::DoorStatus => {
                b.set_door_status(e, DoorStatus::from_code(value).ok_or(BridgeError::InvalidValue(value))?)?
            }
            ElevatorField::TargetFloor => b.set_target_floor(e, floor_index(value)?)?,
            ElevatorField::CurrentFloor => b.set_current_floor(e, floor_index(value)?)?,
            ElevatorField::Acceleration => b.set_acceleration(e, value)?,
            ElevatorField::Speed => b.set_speed(e, value)?,
            ElevatorField::CurrentHeight => b.set_current_height(e, value)?,
            ElevatorField::CurrentPassengersWeight => b.set_current_passengers_weight(e, value)?,
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    //   Per-floor flags
    // ──────────────────────────────────────────────

    fn sync_flag(&mut self, flag: Flag) -> Result<bool, BridgeError> {
        let value = match flag {
            Flag::Requested(e, f) => self.controller.elevator_button(e, f)?,
            Flag::Serviced(e, f) => self.controller.services_floor(e, f)?,
            Flag::Up(f) => self.controller.floor_button_up(f)?,
            Flag::Down(f) => self.controller.floor_button_down(f)?,
        };
        if value == self.model_flag(flag)? {
            return Ok(false);
        }
        self.publish_flag(flag, value)?;
        match flag {
            Flag::Requested(e, f) => self.building.set_floor_requested(e, f, value)?,
            Flag::Serviced(e, f) => self.building.set_floor_to_service(e, f, value)?,
            Flag::Up(f) => self.building.set_up_button(f, value)?,
            Flag::Down(f) => self.building.set_down_button(f, value)?,
        }
        Ok(true)
    }

    fn model_flag(&self, flag: Flag) -> Result<bool, BridgeError> {
        let value = match flag {
            Flag::Requested(e, f) => self.building.floor_requested(e, f)?,
            Flag::Serviced(e, f) => self.building.floor_to_service(e, f)?,
            Flag::Up(f) => self.building.up_button(f)?,
            Flag::Down(f) => self.building.down_button(f)?,
        };
        Ok(value)
    }

    fn publish_flag(&self, flag: Flag, value: bool) -> Result<(), BridgeError> {
        self.bus.publish(&self.scheme.topic(&flag.topic()), encode_bool(value), false)?;
        Ok(())
    }
}

fn floor_code(floor: usize) -> Result<i32, BridgeError> {
    i32::try_from(floor).map_err(|_| BridgeError::InvalidValue(i32::MAX))
}

fn floor_index(value: i32) -> Result<usize, BridgeError> {
    usize::try_from(value).map_err(|_| BridgeError::InvalidValue(value))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusMessage, LocalBroker, Subscription};
    use crate::controller::SimController;

    fn drain(sub: &mut Subscription) -> Vec<BusMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = sub.try_recv() {
            out.push(msg);
        }
        out
    }

    fn setup(elevators: usize, floors: usize) -> (SimController, LocalBroker, TelemetryBridge<SimController, LocalBroker>) {
        let sim = SimController::new(elevators, floors, 10, 10);
        let broker = LocalBroker::new();
        let bridge = TelemetryBridge::start(sim.clone(), broker.clone(), TopicScheme::new("0"), config::POLL_INTERVAL)
            .unwrap();
        (sim, broker, bridge)
    }

    #[test]
    fn startup_publishes_retained_shape() {
        let (_sim, broker, _bridge) = setup(2, 5);
        assert_eq!(broker.retained("buildings/0/NrElevators").as_deref(), Some("2"));
        assert_eq!(broker.retained("buildings/0/NrFloors").as_deref(), Some("5"));
        assert_eq!(broker.retained("buildings/0/elevators/1/ElevatorCapacity").as_deref(), Some("10"));
    }

    #[test]
    fn startup_poll_fills_local_model() {
        let (_sim, _broker, bridge) = setup(1, 3);
        assert_eq!(bridge.building().elevator(0).unwrap().door_status(), DoorStatus::Open);
        assert!(bridge.building().floor_to_service(0, 2).unwrap());
    }

    #[test]
    fn unchanged_values_are_not_republished() {
        let (sim, broker, mut bridge) = setup(1, 3);
        let mut sub = broker.subscribe("buildings/0/#").unwrap();
        drain(&mut sub);

        assert_eq!(bridge.poll_once(), PollStats { published: 0, failed: 0 });
        assert!(drain(&mut sub).is_empty());

        sim.set_weight(0, 150).unwrap();
        assert_eq!(bridge.poll_once().published, 1);
        let msgs = drain(&mut sub);
        assert_eq!(msgs, vec![BusMessage::new("buildings/0/elevators/0/ElevatorCurrentPassengersWeight", "150", false)]);

        assert_eq!(bridge.poll_once().published, 0);
    }

    #[test]
    fn down_button_change_is_detected_on_its_own() {
        let (sim, broker, mut bridge) = setup(1, 3);
        let mut sub = broker.subscribe("buildings/0/floors/#").unwrap();

        sim.press_down(2, true).unwrap();
        bridge.poll_once();
        let msgs = drain(&mut sub);
        assert_eq!(msgs, vec![BusMessage::new("buildings/0/floors/2/ButtonDownPressed", "true", false)]);
    }

    #[test]
    fn failing_call_only_skips_its_value() {
        let (sim, broker, mut bridge) = setup(1, 3);
        let mut sub = broker.subscribe("buildings/0/elevators/#").unwrap();
        drain(&mut sub);

        sim.set_speed(0, 4).unwrap();
        sim.set_weight(0, 80).unwrap();
        sim.fail_call("elevator_speed");
        let stats = bridge.poll_once();
        assert_eq!(stats, PollStats { published: 1, failed: 1 });
        assert_eq!(drain(&mut sub).len(), 1);
        assert_eq!(bridge.building().elevator(0).unwrap().speed(), 0);

        sim.clear_failures();
        assert_eq!(bridge.poll_once().published, 1);
        assert_eq!(bridge.building().elevator(0).unwrap().speed(), 4);
    }

    #[test]
    fn failed_publish_is_retried_next_poll() {
        let (sim, broker, mut bridge) = setup(1, 3);
        sim.press_up(1, true).unwrap();

        broker.set_connected(false);
        let stats = bridge.poll_once();
        assert_eq!(stats.published, 0);
        assert!(!bridge.building().up_button(1).unwrap());

        broker.reconnect();
        let mut sub = broker.subscribe("buildings/0/floors/+/ButtonUpPressed").unwrap();
        assert_eq!(bridge.poll_once().published, 1);
        assert_eq!(drain(&mut sub).len(), 1);
        assert!(bridge.building().up_button(1).unwrap());
    }

    #[test]
    fn snapshot_publishes_every_value_once_then_done() {
        let (elevators, floors) = (2, 4);
        let (_sim, broker, bridge) = setup(elevators, floors);
        let mut sub = broker.subscribe("buildings/0/#").unwrap();
        drain(&mut sub);

        bridge.publish_snapshot().unwrap();
        let msgs = drain(&mut sub);

        let expected = elevators * ElevatorField::ALL.len() + elevators * floors * 2 + floors * 2;
        assert_eq!(msgs.len(), expected + 1);
        let last = msgs.last().unwrap();
        assert_eq!(last.topic, "buildings/0/PublishCurrentState/response");
        assert_eq!(last.payload, "done");

        let mut topics: Vec<&str> = msgs[..expected].iter().map(|m| m.topic.as_str()).collect();
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), expected);
    }

    #[test]
    fn snapshot_is_not_acknowledged_when_publishing_fails() {
        let (_sim, broker, bridge) = setup(1, 2);
        broker.set_connected(false);
        assert!(bridge.publish_snapshot().is_err());
    }

    #[test]
    fn commands_reach_controller_without_touching_model() {
        let (sim, _broker, mut bridge) = setup(2, 5);
        let before = bridge.building().clone();

        bridge.handle_event(BridgeEvent::SetTarget { elevator: 1, floor: 3 });
        bridge.handle_event(BridgeEvent::SetCommittedDirection { elevator: 1, direction: Direction::Up });

        assert_eq!(sim.target(1).unwrap(), 3);
        assert_eq!(sim.committed_direction(1).unwrap(), Direction::Up);
        assert_eq!(bridge.building(), &before);
    }

    #[test]
    fn rejected_command_is_survived() {
        let (sim, _broker, mut bridge) = setup(1, 3);
        sim.fail_call("set_target");
        bridge.handle_event(BridgeEvent::SetTarget { elevator: 0, floor: 2 });
        assert_eq!(sim.target(0).unwrap(), 0);
    }

    #[test]
    fn start_fails_when_controller_is_offline() {
        let sim = SimController::new(1, 3, 10, 10);
        sim.set_offline(true);
        let result = TelemetryBridge::start(sim, LocalBroker::new(), TopicScheme::new("0"), config::POLL_INTERVAL);
        assert!(result.is_err());
    }
}
