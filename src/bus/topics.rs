//! ## Topic scheme
//!
//! Builds and parses the topics shared by the bridge and the dispatcher, all rooted at
//! `buildings/{building_id}/`, and encodes/decodes their payloads.
//!
//! | Topic (below the root)                       | Kind      | Payload          |
//! |----------------------------------------------|-----------|------------------|
//! | `NrElevators`, `NrFloors`                    | retained  | integer          |
//! | `elevators/{e}/ElevatorCapacity`             | retained  | integer          |
//! | `elevators/{e}/Elevator{Field}`              | transient | integer / code   |
//! | `elevators/{e}/FloorRequested/{f}`           | transient | `true`/`false`   |
//! | `elevators/{e}/FloorServiced/{f}`            | transient | `true`/`false`   |
//! | `floors/{f}/ButtonUpPressed`                 | transient | `true`/`false`   |
//! | `floors/{f}/ButtonDownPressed`               | transient | `true`/`false`   |
//! | `elevators/{e}/SetTarget`                    | command   | integer          |
//! | `elevators/{e}/SetCommittedDirection`        | command   | direction code   |
//! | `PublishCurrentState/request`                | transient | `needUpdate`     |
//! | `PublishCurrentState/response`               | transient | `done`           |

use crate::building::{Direction, DoorStatus};
use crate::config;

use thiserror::Error;


/// Errors raised while interpreting a topic or payload received from the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// The topic is not part of this building's scheme.
    #[error("unknown topic {0:?}")]
    Unknown(String),

    /// An index level did not parse as a non-negative integer.
    #[error("bad index {index:?} in topic {topic:?}")]
    BadIndex {
        #[allow(missing_docs)]
        topic: String,
        #[allow(missing_docs)]
        index: String,
    },

    /// The payload could not be decoded for its topic.
    #[error("bad payload {payload:?}, expected {expected}")]
    BadPayload {
        #[allow(missing_docs)]
        payload: String,
        #[allow(missing_docs)]
        expected: &'static str,
    },
}


/// Scalar per-elevator telemetry fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElevatorField {
    Direction,
    DoorStatus,
    TargetFloor,
    CurrentFloor,
    Acceleration,
    Speed,
    CurrentHeight,
    CurrentPassengersWeight,
}

impl ElevatorField {
    /// Every field, in snapshot publish order.
    pub const ALL: [ElevatorField; 8] = [
        ElevatorField::Direction,
        ElevatorField::DoorStatus,
        ElevatorField::TargetFloor,
        ElevatorField::CurrentFloor,
        ElevatorField::Acceleration,
        ElevatorField::Speed,
        ElevatorField::CurrentHeight,
        ElevatorField::CurrentPassengersWeight,
    ];

    /// Last topic level of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            ElevatorField::Direction => "ElevatorDirection",
            ElevatorField::DoorStatus => "ElevatorDoorStatus",
            ElevatorField::TargetFloor => "ElevatorTargetFloor",
            ElevatorField::CurrentFloor => "ElevatorCurrentFloor",
            ElevatorField::Acceleration => "ElevatorAcceleration",
            ElevatorField::Speed => "ElevatorSpeed",
            ElevatorField::CurrentHeight => "ElevatorCurrentHeight",
            ElevatorField::CurrentPassengersWeight => "ElevatorCurrentPassengersWeight",
        }
    }

    fn from_level(level: &str) -> Option<ElevatorField> {
        ElevatorField::ALL.into_iter().find(|field| field.as_str() == level)
    }
}


/// One topic of the scheme, with its indices.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    NrElevators,
    NrFloors,
    ElevatorCapacity(usize),
    Elevator(usize, ElevatorField),
    FloorRequested(usize, usize),
    FloorServiced(usize, usize),
    ButtonUp(usize),
    ButtonDown(usize),
    SetTarget(usize),
    SetCommittedDirection(usize),
    SnapshotRequest,
    SnapshotResponse,
}


/// Topic builder/parser bound to one building id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    root: String,
}

impl TopicScheme {
    /// Scheme for `buildings/{building_id}/`.
    pub fn new(building_id: &str) -> Self {
        Self { root: format!("{}{}{}", config::TOPIC_BUILDING, config::TOPIC_SEP, building_id) }
    }

    /// `buildings/{id}`, without trailing separator.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Filter matching every topic of the building.
    pub fn all(&self) -> String {
        format!("{}/#", self.root)
    }

    /// Filter matching both command topics of every elevator.
    pub fn command_filters(&self) -> [String; 2] {
        [
            format!("{}/{}/+/{}", self.root, config::TOPIC_ELEVATORS, config::SUBTOPIC_SET_TARGET),
            format!("{}/{}/+/{}", self.root, config::TOPIC_ELEVATORS, config::SUBTOPIC_SET_DIRECTION),
        ]
    }

    /// Full topic string of `topic`.
    pub fn topic(&self, topic: &Topic) -> String {
        let root = &self.root;
        let el = config::TOPIC_ELEVATORS;
        match *topic {
            Topic::NrElevators => format!("{root}/{}", config::TOPIC_NR_ELEVATORS),
            Topic::NrFloors => format!("{root}/{}", config::TOPIC_NR_FLOORS),
            Topic::ElevatorCapacity(e) => format!("{root}/{el}/{e}/{}", config::SUBTOPIC_CAPACITY),
            Topic::Elevator(e, field) => format!("{root}/{el}/{e}/{}", field.as_str()),
            Topic::FloorRequested(e, f) => format!("{root}/{el}/{e}/{}/{f}", config::SUBTOPIC_FLOOR_REQUESTED),
            Topic::FloorServiced(e, f) => format!("{root}/{el}/{e}/{}/{f}", config::SUBTOPIC_FLOOR_SERVICED),
            Topic::ButtonUp(f) => format!("{root}/{}/{f}/{}", config::TOPIC_FLOORS, config::SUBTOPIC_BUTTON_UP),
            Topic::ButtonDown(f) => format!("{root}/{}/{f}/{}", config::TOPIC_FLOORS, config::SUBTOPIC_BUTTON_DOWN),
            Topic::SetTarget(e) => format!("{root}/{el}/{e}/{}", config::SUBTOPIC_SET_TARGET),
            Topic::SetCommittedDirection(e) => format!("{root}/{el}/{e}/{}", config::SUBTOPIC_SET_DIRECTION),
            Topic::SnapshotRequest => {
                format!("{root}/{}/{}", config::TOPIC_PUBLISH_CURRENT_STATE, config::SUBTOPIC_REQUEST)
            }
            Topic::SnapshotResponse => {
                format!("{root}/{}/{}", config::TOPIC_PUBLISH_CURRENT_STATE, config::SUBTOPIC_RESPONSE)
            }
        }
    }

    /// Parses a full topic string.
    ///
    /// Only the shape and the numeric form of indices are checked here; whether an
    /// index fits the building is up to the caller, which knows the counts.
    pub fn parse(&self, topic: &str) -> Result<Topic, TopicError> {
        let unknown = || TopicError::Unknown(topic.to_string());
        let rest = topic
            .strip_prefix(self.root.as_str())
            .and_then(|r| r.strip_prefix(config::TOPIC_SEP))
            .ok_or_else(unknown)?;
        let levels: Vec<&str> = rest.split(config::TOPIC_SEP).collect();
        let index = |level: &str| -> Result<usize, TopicError> {
            level.parse::<usize>().map_err(|_| TopicError::BadIndex {
                topic: topic.to_string(),
                index: level.to_string(),
            })
        };

        match levels.as_slice() {
            [config::TOPIC_NR_ELEVATORS] => Ok(Topic::NrElevators),
            [config::TOPIC_NR_FLOORS] => Ok(Topic::NrFloors),
            [config::TOPIC_PUBLISH_CURRENT_STATE, config::SUBTOPIC_REQUEST] => Ok(Topic::SnapshotRequest),
            [config::TOPIC_PUBLISH_CURRENT_STATE, config::SUBTOPIC_RESPONSE] => Ok(Topic::SnapshotResponse),
            [config::TOPIC_FLOORS, f, config::SUBTOPIC_BUTTON_UP] => Ok(Topic::ButtonUp(index(*f)?)),
            [config::TOPIC_FLOORS, f, config::SUBTOPIC_BUTTON_DOWN] => Ok(Topic::ButtonDown(index(*f)?)),
            [config::TOPIC_ELEVATORS, e, config::SUBTOPIC_FLOOR_REQUESTED, f] => {
                Ok(Topic::FloorRequested(index(*e)?, index(*f)?))
            }
            [config::TOPIC_ELEVATORS, e, config::SUBTOPIC_FLOOR_SERVICED, f] => {
                Ok(Topic::FloorServiced(index(*e)?, index(*f)?))
            }
            [config::TOPIC_ELEVATORS, e, config::SUBTOPIC_CAPACITY] => Ok(Topic::ElevatorCapacity(index(*e)?)),
            [config::TOPIC_ELEVATORS, e, config::SUBTOPIC_SET_TARGET] => Ok(Topic::SetTarget(index(*e)?)),
            [config::TOPIC_ELEVATORS, e, config::SUBTOPIC_SET_DIRECTION] => {
                Ok(Topic::SetCommittedDirection(index(*e)?))
            }
            [config::TOPIC_ELEVATORS, e, field] => match ElevatorField::from_level(field) {
                Some(field) => Ok(Topic::Elevator(index(*e)?, field)),
                None => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }
}


/// Parses a decimal integer payload.
pub fn parse_int(payload: &str) -> Result<i32, TopicError> {
    payload.trim().parse::<i32>().map_err(|_| TopicError::BadPayload {
        payload: payload.to_string(),
        expected: "integer",
    })
}

/// Parses a non-negative integer payload (counts, floors).
pub fn parse_index(payload: &str) -> Result<usize, TopicError> {
    payload.trim().parse::<usize>().map_err(|_| TopicError::BadPayload {
        payload: payload.to_string(),
        expected: "non-negative integer",
    })
}

/// Parses a `true`/`false` payload.
pub fn parse_bool(payload: &str) -> Result<bool, TopicError> {
    match payload.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(TopicError::BadPayload { payload: payload.to_string(), expected: "true or false" }),
    }
}

/// Parses a direction wire code.
pub fn parse_direction(payload: &str) -> Result<Direction, TopicError> {
    let code = parse_int(payload)?;
    Direction::from_code(code).ok_or(TopicError::BadPayload {
        payload: payload.to_string(),
        expected: "direction code",
    })
}

/// Parses a door status wire code.
pub fn parse_door_status(payload: &str) -> Result<DoorStatus, TopicError> {
    let code = parse_int(payload)?;
    DoorStatus::from_code(code).ok_or(TopicError::BadPayload {
        payload: payload.to_string(),
        expected: "door status code",
    })
}

/// Encodes a boolean payload.
pub fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_documented_topic_strings() {
        let scheme = TopicScheme::new("0");
        assert_eq!(scheme.topic(&Topic::NrElevators), "buildings/0/NrElevators");
        assert_eq!(scheme.topic(&Topic::ElevatorCapacity(1)), "buildings/0/elevators/1/ElevatorCapacity");
        assert_eq!(
            scheme.topic(&Topic::Elevator(2, ElevatorField::CurrentPassengersWeight)),
            "buildings/0/elevators/2/ElevatorCurrentPassengersWeight"
        );
        assert_eq!(scheme.topic(&Topic::FloorServiced(0, 4)), "buildings/0/elevators/0/FloorServiced/4");
        assert_eq!(scheme.topic(&Topic::ButtonDown(3)), "buildings/0/floors/3/ButtonDownPressed");
        assert_eq!(scheme.topic(&Topic::SnapshotRequest), "buildings/0/PublishCurrentState/request");
        assert_eq!(scheme.topic(&Topic::SnapshotResponse), "buildings/0/PublishCurrentState/response");
    }

    #[test]
    fn parse_inverts_topic() {
        let scheme = TopicScheme::new("b7");
        let topics = [
            Topic::NrElevators,
            Topic::NrFloors,
            Topic::ElevatorCapacity(3),
            Topic::Elevator(1, ElevatorField::DoorStatus),
            Topic::FloorRequested(2, 9),
            Topic::FloorServiced(0, 1),
            Topic::ButtonUp(4),
            Topic::ButtonDown(0),
            Topic::SetTarget(5),
            Topic::SetCommittedDirection(5),
            Topic::SnapshotRequest,
            Topic::SnapshotResponse,
        ];
        for topic in topics {
            assert_eq!(scheme.parse(&scheme.topic(&topic)), Ok(topic));
        }
    }

    #[test]
    fn parse_rejects_foreign_and_malformed_topics() {
        let scheme = TopicScheme::new("0");
        assert!(matches!(scheme.parse("buildings/1/NrFloors"), Err(TopicError::Unknown(_))));
        assert!(matches!(scheme.parse("buildings/0/elevators/x/SetTarget"), Err(TopicError::BadIndex { .. })));
        assert!(matches!(scheme.parse("buildings/0/elevators/-1/SetTarget"), Err(TopicError::BadIndex { .. })));
        assert!(matches!(scheme.parse("buildings/0/elevators/1/Nonsense"), Err(TopicError::Unknown(_))));
        assert!(matches!(scheme.parse("buildings/0"), Err(TopicError::Unknown(_))));
    }

    #[test]
    fn payload_codecs() {
        assert_eq!(parse_int(" 42 "), Ok(42));
        assert!(parse_int("4.2").is_err());
        assert!(parse_index("-1").is_err());
        assert_eq!(parse_bool("true"), Ok(true));
        assert!(parse_bool("1").is_err());
        assert_eq!(parse_direction("1"), Ok(Direction::Down));
        assert!(parse_direction("9").is_err());
        assert_eq!(parse_door_status("4"), Ok(DoorStatus::Closing));
        assert_eq!(encode_bool(false), "false");
    }
}
