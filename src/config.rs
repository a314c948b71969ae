//! # config.rs – Centralized Parameter Store
//!
//! This module holds all static program parameters used throughout the system.
//! Runtime-tunable values (intervals, building id, simulator shape) have their defaults here
//! and can be overridden through [`crate::init::Settings`].

use std::sync::Mutex;
use std::time::Duration;
use once_cell::sync::Lazy;

//
// ──────────────────────────────────────────────────────────────
//   1. BUS TOPICS
// ──────────────────────────────────────────────────────────────
//

/// Root of every topic, followed by the building id
pub const TOPIC_BUILDING: &str = "buildings";

/// Topic level separator
pub const TOPIC_SEP: &str = "/";

/// Default building id
pub const DEFAULT_BUILDING_ID: &str = "0";

/// Retained: number of elevators in the building
pub const TOPIC_NR_ELEVATORS: &str = "NrElevators";

/// Retained: number of floors in the building
pub const TOPIC_NR_FLOORS: &str = "NrFloors";

/// Level holding per-elevator topics
pub const TOPIC_ELEVATORS: &str = "elevators";

/// Level holding per-floor topics
pub const TOPIC_FLOORS: &str = "floors";

/// Retained, per elevator
pub const SUBTOPIC_CAPACITY: &str = "ElevatorCapacity";

/// Per elevator and floor: inside call
pub const SUBTOPIC_FLOOR_REQUESTED: &str = "FloorRequested";

/// Per elevator and floor: service zone membership
pub const SUBTOPIC_FLOOR_SERVICED: &str = "FloorServiced";

/// Per floor hall-call buttons
pub const SUBTOPIC_BUTTON_UP: &str = "ButtonUpPressed";
#[allow(missing_docs)]
pub const SUBTOPIC_BUTTON_DOWN: &str = "ButtonDownPressed";

/// Command: set target floor
pub const SUBTOPIC_SET_TARGET: &str = "SetTarget";

/// Command: set committed direction
pub const SUBTOPIC_SET_DIRECTION: &str = "SetCommittedDirection";

/// Level used for the snapshot handshake
pub const TOPIC_PUBLISH_CURRENT_STATE: &str = "PublishCurrentState";

/// Sub-level the dispatcher asks on
pub const SUBTOPIC_REQUEST: &str = "request";

/// Sub-level the bridge answers on
pub const SUBTOPIC_RESPONSE: &str = "response";

/// Payload of a snapshot request
pub const SNAPSHOT_REQUEST_PAYLOAD: &str = "needUpdate";

/// Payload of a snapshot acknowledgment
pub const SNAPSHOT_RESPONSE_PAYLOAD: &str = "done";

//
// ──────────────────────────────────────────────────────────────
//   2. WIRE CODES
// ──────────────────────────────────────────────────────────────
//

/// Committed direction codes, as used by the controller
pub const DIRECTION_UP: i32 = 0;
#[allow(missing_docs)]
pub const DIRECTION_DOWN: i32 = 1;
#[allow(missing_docs)]
pub const DIRECTION_UNCOMMITTED: i32 = 2;

/// Door status codes, as used by the controller
pub const DOORS_OPEN: i32 = 1;
#[allow(missing_docs)]
pub const DOORS_CLOSED: i32 = 2;
#[allow(missing_docs)]
pub const DOORS_OPENING: i32 = 3;
#[allow(missing_docs)]
pub const DOORS_CLOSING: i32 = 4;

//
// ──────────────────────────────────────────────────────────────
//   3. DISPATCH PARAMETERS
// ──────────────────────────────────────────────────────────────
//

/// Divisor turning total passenger weight into an approximate head count.
/// An elevator counts as full when `weight / AVERAGE_PASSENGER_WEIGHT > capacity`.
pub const AVERAGE_PASSENGER_WEIGHT: i32 = 75;

//
// ──────────────────────────────────────────────────────────────
//   4. TIMING & INTERVALS
// ──────────────────────────────────────────────────────────────
//

/// Time between two bridge polls of the controller
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time between two dispatch decision ticks
pub const DISPATCH_INTERVAL: Duration = Duration::from_millis(1000);

/// How long the dispatcher waits for a snapshot acknowledgment before asking again
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Time between two simulator physics steps in the bundled binary
pub const SIM_STEP_INTERVAL: Duration = Duration::from_millis(500);

/// Number of simulator steps the doors stay open at a floor
pub const SIM_DOOR_DWELL_STEPS: u32 = 2;

/// How often the binary prints the dispatcher's mirrored building
pub const PRINT_BUILDING_INTERVAL: Duration = Duration::from_millis(2000);

//
// ──────────────────────────────────────────────────────────────
//   5. SIMULATOR DEFAULTS
// ──────────────────────────────────────────────────────────────
//

/// Default number of elevators in the simulated building
pub const DEFAULT_NUM_ELEVATORS: usize = 2;

/// Default number of floors in the simulated building
pub const DEFAULT_NUM_FLOORS: usize = 6;

/// Default rated capacity (persons) per elevator
pub const DEFAULT_CAPACITY: i32 = 10;

/// Default floor height in feet
pub const DEFAULT_FLOOR_HEIGHT: i32 = 10;

//
// ──────────────────────────────────────────────────────────────
//   6. LOGGING CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Enable/disable printing of the mirrored building table
pub static PRINT_BUILDING_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of errors
pub static PRINT_ERR_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of warnings
pub static PRINT_WARN_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of success messages
pub static PRINT_OK_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of general info
pub static PRINT_INFO_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable bridge/dispatch traffic prints
pub static PRINT_ELSE_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));
