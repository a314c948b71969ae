//! ## Controller Module
//!
//! The surface of the physical (or simulated) elevator controller, as consumed by the
//! telemetry bridge. Every call is a blocking remote call that may fail; the bridge
//! isolates each failure to the single value it was reading.
//!
//! ### Submodules
//! - [`sim`]: in-memory simulator implementing [`ElevatorController`].

pub mod sim;

pub use sim::SimController;

use crate::building::{Direction, DoorStatus};

use thiserror::Error;


/// Errors a controller call may return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The controller reported a fault, or the connection to it broke.
    #[error("remote controller fault: {0}")]
    Remote(String),

    /// The call did not complete in time.
    #[error("controller call timed out")]
    Timeout,

    /// The controller rejected an argument (index or value out of range).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}


/// Remote elevator controller.
///
/// Elevators and floors are addressed by zero-based index. Direction and door status
/// are exchanged as typed values; a transport speaking wire codes converts through
/// [`Direction::from_code`] and [`DoorStatus::from_code`].
pub trait ElevatorController: Send + 'static {
    /// Number of elevators in the building.
    fn elevator_num(&self) -> Result<usize, ControllerError>;
    /// Number of floors in the building.
    fn floor_num(&self) -> Result<usize, ControllerError>;
    /// Height of one floor in feet.
    fn floor_height(&self) -> Result<i32, ControllerError>;
    /// Controller clock tick.
    fn clock_tick(&self) -> Result<u64, ControllerError>;

    /// Committed direction shown on the elevator.
    fn committed_direction(&self, elevator: usize) -> Result<Direction, ControllerError>;
    #[allow(missing_docs)]
    fn door_status(&self, elevator: usize) -> Result<DoorStatus, ControllerError>;
    /// Floor the elevator is heading to.
    fn target(&self, elevator: usize) -> Result<usize, ControllerError>;
    /// Closest floor to the elevator's position.
    fn elevator_floor(&self, elevator: usize) -> Result<usize, ControllerError>;
    #[allow(missing_docs)]
    fn elevator_accel(&self, elevator: usize) -> Result<i32, ControllerError>;
    #[allow(missing_docs)]
    fn elevator_speed(&self, elevator: usize) -> Result<i32, ControllerError>;
    /// Height above ground floor in feet.
    fn elevator_position(&self, elevator: usize) -> Result<i32, ControllerError>;
    /// Total passenger weight.
    fn elevator_weight(&self, elevator: usize) -> Result<i32, ControllerError>;
    /// Rated capacity in persons.
    fn elevator_capacity(&self, elevator: usize) -> Result<i32, ControllerError>;

    /// Inside call: whether `floor` is pressed inside `elevator`.
    fn elevator_button(&self, elevator: usize, floor: usize) -> Result<bool, ControllerError>;
    /// Whether `elevator` serves `floor`.
    fn services_floor(&self, elevator: usize, floor: usize) -> Result<bool, ControllerError>;
    /// Hall call up at `floor`.
    fn floor_button_up(&self, floor: usize) -> Result<bool, ControllerError>;
    /// Hall call down at `floor`.
    fn floor_button_down(&self, floor: usize) -> Result<bool, ControllerError>;

    #[allow(missing_docs)]
    fn set_target(&self, elevator: usize, floor: usize) -> Result<(), ControllerError>;
    #[allow(missing_docs)]
    fn set_committed_direction(&self, elevator: usize, direction: Direction) -> Result<(), ControllerError>;
    /// Adds or removes `floor` from the elevator's service zone.
    fn set_services_floor(&self, elevator: usize, floor: usize, service: bool) -> Result<(), ControllerError>;
}
