//! ## Building Module
//!
//! This module defines the in-memory mirror of a building: every elevator's observable
//! telemetry and every floor's hall-call buttons. Both the bridge and the dispatcher own
//! their own [`BuildingState`]; the two instances are never shared and converge only
//! through the bus.
//!
//! ### Key Responsibilities:
//! - **Defining Core Structs**: [`BuildingState`] and [`ElevatorState`] store building-wide
//!   and per-elevator state, respectively.
//! - **Directions and Doors**: [`Direction`] and [`DoorStatus`] carry the controller's wire codes.
//! - **Bounds Validation**: every accessor and mutator taking an elevator or floor index
//!   checks it and fails with a [`BuildingError`] instead of clamping.
//! - **Deep Copy**: `Clone` produces a fully independent copy, used by the dispatcher
//!   to compute each tick on a private snapshot.

use crate::config;

use std::fmt;
use thiserror::Error;


/// Errors raised by the building model when an index or value is outside its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildingError {
    /// Elevator index outside `0..count`.
    #[error("elevator index {index} out of range (building has {count} elevators)")]
    ElevatorOutOfRange {
        /// The offending index
        index: usize,
        /// Number of elevators in the building
        count: usize,
    },

    /// Floor index outside `0..count`.
    #[error("floor index {index} out of range (building has {count} floors)")]
    FloorOutOfRange {
        /// The offending index
        index: usize,
        /// Number of floors in the building
        count: usize,
    },

    /// A capacity list whose length does not match the elevator count.
    #[error("expected {expected} elevator capacities, got {got}")]
    CapacityMismatch {
        #[allow(missing_docs)]
        expected: usize,
        #[allow(missing_docs)]
        got: usize,
    },
}


/// Direction an elevator has committed to (the one shown on its display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    #[allow(missing_docs)]
    Up,
    #[allow(missing_docs)]
    Down,
    /// Idle, no commitment
    Uncommitted,
}

impl Direction {
    /// Controller/bus wire code of the direction.
    pub fn code(self) -> i32 {
        match self {
            Direction::Up => config::DIRECTION_UP,
            Direction::Down => config::DIRECTION_DOWN,
            Direction::Uncommitted => config::DIRECTION_UNCOMMITTED,
        }
    }

    /// Parses a wire code. Returns `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Direction> {
        match code {
            config::DIRECTION_UP => Some(Direction::Up),
            config::DIRECTION_DOWN => Some(Direction::Down),
            config::DIRECTION_UNCOMMITTED => Some(Direction::Uncommitted),
            _ => None,
        }
    }

    /// The opposite travel direction. `Uncommitted` stays `Uncommitted`.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Uncommitted => Direction::Uncommitted,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
            Direction::Uncommitted => write!(f, "Uncommitted"),
        }
    }
}


/// State of an elevator's doors.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorStatus {
    Open,
    Closed,
    Opening,
    Closing,
}

impl DoorStatus {
    /// Controller/bus wire code of the door status.
    pub fn code(self) -> i32 {
        match self {
            DoorStatus::Open => config::DOORS_OPEN,
            DoorStatus::Closed => config::DOORS_CLOSED,
            DoorStatus::Opening => config::DOORS_OPENING,
            DoorStatus::Closing => config::DOORS_CLOSING,
        }
    }

    /// Parses a wire code. Returns `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<DoorStatus> {
        match code {
            config::DOORS_OPEN => Some(DoorStatus::Open),
            config::DOORS_CLOSED => Some(DoorStatus::Closed),
            config::DOORS_OPENING => Some(DoorStatus::Opening),
            config::DOORS_CLOSING => Some(DoorStatus::Closing),
            _ => None,
        }
    }
}

impl fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}


/// Represents the observable state of one elevator.
///
/// Scalar telemetry is public to read through getters; the per-floor arrays are only
/// reachable through index-checked methods so their length always equals the floor count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatorState {
    direction: Direction,
    door_status: DoorStatus,
    target_floor: usize,
    current_floor: usize,
    acceleration: i32,
    speed: i32,
    current_height: i32,
    current_passengers_weight: i32,
    max_passengers: i32,
    /// Inside calls, one entry per floor
    floors_requested: Vec<bool>,
    /// Service zone, one entry per floor
    floors_to_service: Vec<bool>,
}

impl ElevatorState {
    /// Creates an idle elevator at floor 0 with doors closed.
    ///
    /// ## Parameters
    /// - `num_floors`: Length of the per-floor arrays.
    /// - `max_passengers`: Rated capacity, fixed for the elevator's lifetime.
    pub fn new(num_floors: usize, max_passengers: i32) -> Self {
        Self {
            direction: Direction::Uncommitted,
            door_status: DoorStatus::Closed,
            target_floor: 0,
            current_floor: 0,
            acceleration: 0,
            speed: 0,
            current_height: 0,
            current_passengers_weight: 0,
            max_passengers,
            floors_requested: vec![false; num_floors],
            floors_to_service: vec![false; num_floors],
        }
    }

    #[allow(missing_docs)]
    pub fn direction(&self) -> Direction { self.direction }
    #[allow(missing_docs)]
    pub fn door_status(&self) -> DoorStatus { self.door_status }
    #[allow(missing_docs)]
    pub fn target_floor(&self) -> usize { self.target_floor }
    #[allow(missing_docs)]
    pub fn current_floor(&self) -> usize { self.current_floor }
    #[allow(missing_docs)]
    pub fn acceleration(&self) -> i32 { self.acceleration }
    #[allow(missing_docs)]
    pub fn speed(&self) -> i32 { self.speed }
    #[allow(missing_docs)]
    pub fn current_height(&self) -> i32 { self.current_height }
    #[allow(missing_docs)]
    pub fn current_passengers_weight(&self) -> i32 { self.current_passengers_weight }
    #[allow(missing_docs)]
    pub fn max_passengers(&self) -> i32 { self.max_passengers }

    /// Number of floors this elevator's arrays cover.
    pub fn num_floors(&self) -> usize {
        self.floors_requested.len()
    }

    /// Whether a passenger inside the cab has requested `floor`.
    pub fn floor_requested(&self, floor: usize) -> Result<bool, BuildingError> {
        self.check_floor(floor)?;
        Ok(self.floors_requested[floor])
    }

    /// Whether this elevator is configured to serve `floor` at all.
    pub fn floor_to_service(&self, floor: usize) -> Result<bool, BuildingError> {
        self.check_floor(floor)?;
        Ok(self.floors_to_service[floor])
    }

    /// Sets the inside-call state of `floor`.
    pub fn set_floor_requested(&mut self, floor: usize, requested: bool) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.floors_requested[floor] = requested;
        Ok(())
    }

    /// Sets the service-zone membership of `floor`.
    pub fn set_floor_to_service(&mut self, floor: usize, service: bool) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.floors_to_service[floor] = service;
        Ok(())
    }

    /// Rough head count exceeds the rated capacity.
    ///
    /// The head count is `weight / AVERAGE_PASSENGER_WEIGHT` in integer division, so
    /// the threshold is strict: exactly `max_passengers` average passengers is not full.
    pub fn is_full(&self) -> bool {
        self.current_passengers_weight / config::AVERAGE_PASSENGER_WEIGHT > self.max_passengers
    }

    fn check_floor(&self, floor: usize) -> Result<(), BuildingError> {
        if floor >= self.floors_requested.len() {
            return Err(BuildingError::FloorOutOfRange { index: floor, count: self.floors_requested.len() });
        }
        Ok(())
    }
}


/// In-memory mirror of a whole building.
///
/// Sizes (`elevators`, `floors`, capacities) are fixed at construction; everything else
/// mutates in place. `Clone` is a deep copy: the clone shares no state with the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingState {
    elevators: Vec<ElevatorState>,
    floor_up_pressed: Vec<bool>,
    floor_down_pressed: Vec<bool>,
    num_floors: usize,
}

impl BuildingState {
    /// Creates a building with one elevator per entry in `capacities`.
    ///
    /// ## Example
    /// ```
    /// use elevatorsync::building::BuildingState;
    ///
    /// let building = BuildingState::new(&[10, 12], 6);
    /// assert_eq!(building.num_elevators(), 2);
    /// assert_eq!(building.elevator(1).unwrap().max_passengers(), 12);
    /// assert!(building.elevator(2).is_err());
    /// ```
    pub fn new(capacities: &[i32], num_floors: usize) -> Self {
        Self {
            elevators: capacities.iter().map(|cap| ElevatorState::new(num_floors, *cap)).collect(),
            floor_up_pressed: vec![false; num_floors],
            floor_down_pressed: vec![false; num_floors],
            num_floors,
        }
    }

    /// Same as [`BuildingState::new`] with every elevator sharing one capacity.
    pub fn uniform(num_elevators: usize, num_floors: usize, max_passengers: i32) -> Self {
        Self::new(&vec![max_passengers; num_elevators], num_floors)
    }

    /// Creates a building after checking that `capacities` covers exactly `num_elevators`.
    pub fn with_capacities(num_elevators: usize, num_floors: usize, capacities: &[i32]) -> Result<Self, BuildingError> {
        if capacities.len() != num_elevators {
            return Err(BuildingError::CapacityMismatch { expected: num_elevators, got: capacities.len() });
        }
        Ok(Self::new(capacities, num_floors))
    }

    /// Returns the number of elevators in the building.
    pub fn num_elevators(&self) -> usize {
        self.elevators.len()
    }

    /// Returns the number of floors in the building.
    pub fn num_floors(&self) -> usize {
        self.num_floors
    }

    /// All elevators, index == elevator id.
    pub fn elevators(&self) -> &[ElevatorState] {
        &self.elevators
    }

    /// Returns the elevator with index `elevator`.
    pub fn elevator(&self, elevator: usize) -> Result<&ElevatorState, BuildingError> {
        let count = self.elevators.len();
        self.elevators.get(elevator).ok_or(BuildingError::ElevatorOutOfRange { index: elevator, count })
    }

    /// Mutable access to the elevator with index `elevator`.
    pub fn elevator_mut(&mut self, elevator: usize) -> Result<&mut ElevatorState, BuildingError> {
        let count = self.elevators.len();
        self.elevators.get_mut(elevator).ok_or(BuildingError::ElevatorOutOfRange { index: elevator, count })
    }

    /// Hall-call up button state of `floor`.
    pub fn up_button(&self, floor: usize) -> Result<bool, BuildingError> {
        self.check_floor(floor)?;
        Ok(self.floor_up_pressed[floor])
    }

    /// Hall-call down button state of `floor`.
    pub fn down_button(&self, floor: usize) -> Result<bool, BuildingError> {
        self.check_floor(floor)?;
        Ok(self.floor_down_pressed[floor])
    }

    /// Either hall-call button is pressed at `floor`.
    pub fn hall_call(&self, floor: usize) -> Result<bool, BuildingError> {
        Ok(self.up_button(floor)? || self.down_button(floor)?)
    }

    #[allow(missing_docs)]
    pub fn set_up_button(&mut self, floor: usize, pressed: bool) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.floor_up_pressed[floor] = pressed;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_down_button(&mut self, floor: usize, pressed: bool) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.floor_down_pressed[floor] = pressed;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_direction(&mut self, elevator: usize, direction: Direction) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.direction = direction;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_door_status(&mut self, elevator: usize, status: DoorStatus) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.door_status = status;
        Ok(())
    }

    /// Sets the target floor. Both the elevator and the floor are validated.
    pub fn set_target_floor(&mut self, elevator: usize, floor: usize) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.elevator_mut(elevator)?.target_floor = floor;
        Ok(())
    }

    /// Sets the current floor. Both the elevator and the floor are validated.
    pub fn set_current_floor(&mut self, elevator: usize, floor: usize) -> Result<(), BuildingError> {
        self.check_floor(floor)?;
        self.elevator_mut(elevator)?.current_floor = floor;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_acceleration(&mut self, elevator: usize, acceleration: i32) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.acceleration = acceleration;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_speed(&mut self, elevator: usize, speed: i32) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.speed = speed;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_current_height(&mut self, elevator: usize, height: i32) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.current_height = height;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn set_current_passengers_weight(&mut self, elevator: usize, weight: i32) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.current_passengers_weight = weight;
        Ok(())
    }

    /// Inside call of `floor` in `elevator`.
    pub fn floor_requested(&self, elevator: usize, floor: usize) -> Result<bool, BuildingError> {
        self.elevator(elevator)?.floor_requested(floor)
    }

    /// Service-zone membership of `floor` for `elevator`.
    pub fn floor_to_service(&self, elevator: usize, floor: usize) -> Result<bool, BuildingError> {
        self.elevator(elevator)?.floor_to_service(floor)
    }

    #[allow(missing_docs)]
    pub fn set_floor_requested(&mut self, elevator: usize, floor: usize, requested: bool) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.set_floor_requested(floor, requested)
    }

    #[allow(missing_docs)]
    pub fn set_floor_to_service(&mut self, elevator: usize, floor: usize, service: bool) -> Result<(), BuildingError> {
        self.elevator_mut(elevator)?.set_floor_to_service(floor, service)
    }

    fn check_floor(&self, floor: usize) -> Result<(), BuildingError> {
        if floor >= self.num_floors {
            return Err(BuildingError::FloorOutOfRange { index: floor, count: self.num_floors });
        }
        Ok(())
    }
}
