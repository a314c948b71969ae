//! Bus-to-bridge forwarding.
//!
//! One tokio task per subscription turns inbound bus messages into [`BridgeEvent`]s on a
//! crossbeam channel read by the bridge's poll thread. Malformed messages are logged and
//! dropped here, so the poll thread only ever sees validated indices.

use crate::building::{BuildingError, Direction};
use crate::bus::topics::{self, Topic, TopicError, TopicScheme};
use crate::bus::{Bus, BusError, BusMessage, Subscription};
use crate::config;
use crate::print;
use crate::bridge::BridgeError;

use crossbeam_channel as cbc;


/// Work for the bridge's poll thread.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    SetTarget { elevator: usize, floor: usize },
    SetCommittedDirection { elevator: usize, direction: Direction },
    SnapshotRequest,
}


/// Validates and decodes one inbound message.
///
/// ## Parameters
/// - `scheme`: Topic scheme of the bridge's building.
/// - `msg`: The received message.
/// - `num_elevators`, `num_floors`: Bounds the indices and target floor must respect.
pub fn parse_event(
    scheme: &TopicScheme,
    msg: &BusMessage,
    num_elevators: usize,
    num_floors: usize,
) -> Result<BridgeEvent, BridgeError> {
    let check_elevator = |e: usize| -> Result<usize, BridgeError> {
        if e >= num_elevators {
            return Err(BuildingError::ElevatorOutOfRange { index: e, count: num_elevators }.into());
        }
        Ok(e)
    };

    match scheme.parse(&msg.topic)? {
        Topic::SetTarget(e) => {
            let elevator = check_elevator(e)?;
            let floor = topics::parse_index(&msg.payload)?;
            if floor >= num_floors {
                return Err(BuildingError::FloorOutOfRange { index: floor, count: num_floors }.into());
            }
            Ok(BridgeEvent::SetTarget { elevator, floor })
        }
        Topic::SetCommittedDirection(e) => {
            let elevator = check_elevator(e)?;
            let direction = topics::parse_direction(&msg.payload)?;
            Ok(BridgeEvent::SetCommittedDirection { elevator, direction })
        }
        Topic::SnapshotRequest => {
            if msg.payload.trim() != config::SNAPSHOT_REQUEST_PAYLOAD {
                return Err(TopicError::BadPayload {
                    payload: msg.payload.clone(),
                    expected: config::SNAPSHOT_REQUEST_PAYLOAD,
                }
                .into());
            }
            Ok(BridgeEvent::SnapshotRequest)
        }
        _ => Err(BridgeError::UnexpectedTopic(msg.topic.clone())),
    }
}


/// Subscribes to both command topics and the snapshot request topic and spawns one
/// forwarding task per subscription.
///
/// Must be called from within a tokio runtime. The returned receiver is meant for
/// [`crate::bridge::TelemetryBridge::run`]; it disconnects once every forwarding task
/// has ended.
pub fn spawn_event_forwarders<B: Bus>(
    bus: &B,
    scheme: &TopicScheme,
    num_elevators: usize,
    num_floors: usize,
) -> Result<cbc::Receiver<BridgeEvent>, BusError> {
    let (tx, rx) = cbc::unbounded::<BridgeEvent>();

    let [target_filter, direction_filter] = scheme.command_filters();
    let filters = [target_filter, direction_filter, scheme.topic(&Topic::SnapshotRequest)];
    for filter in filters {
        let sub = bus.subscribe(&filter)?;
        tokio::spawn(forward(sub, scheme.clone(), num_elevators, num_floors, tx.clone()));
    }
    Ok(rx)
}

async fn forward(
    mut sub: Subscription,
    scheme: TopicScheme,
    num_elevators: usize,
    num_floors: usize,
    tx: cbc::Sender<BridgeEvent>,
) {
    while let Some(msg) = sub.recv().await {
        match parse_event(&scheme, &msg, num_elevators, num_floors) {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(e) => print::warn(format!("Dropping message on {}: {}", msg.topic, e)),
        }
    }
}
