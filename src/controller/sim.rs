//! In-memory elevator simulator.
//!
//! [`SimController`] implements [`ElevatorController`] over shared state, so one clone can
//! be handed to the bridge while another drives the physics with [`SimController::step`]
//! and a third scripts button presses from a test.
//!
//! Physics per step and elevator:
//! - at its target with doors not open: doors open, the floor's inside call and hall calls clear
//! - doors open and a different target: wait the dwell, then start closing
//! - doors closing: doors closed
//! - doors closed and a different target: move one floor toward it

use crate::building::{Direction, DoorStatus};
use crate::config;
use crate::controller::{ControllerError, ElevatorController};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};


#[derive(Debug, Clone)]
struct SimElevator {
    direction: Direction,
    door_status: DoorStatus,
    target: usize,
    floor: usize,
    accel: i32,
    speed: i32,
    position: i32,
    weight: i32,
    capacity: i32,
    buttons: Vec<bool>,
    services: Vec<bool>,
    dwell: u32,
}

#[derive(Debug)]
struct SimState {
    elevators: Vec<SimElevator>,
    up: Vec<bool>,
    down: Vec<bool>,
    floor_height: i32,
    clock_tick: u64,
    failing: HashSet<&'static str>,
    offline: bool,
}

impl SimState {
    fn elevator(&self, e: usize) -> Result<&SimElevator, ControllerError> {
        self.elevators
            .get(e)
            .ok_or_else(|| ControllerError::InvalidArgument(format!("elevator {e}")))
    }

    fn elevator_mut(&mut self, e: usize) -> Result<&mut SimElevator, ControllerError> {
        self.elevators
            .get_mut(e)
            .ok_or_else(|| ControllerError::InvalidArgument(format!("elevator {e}")))
    }

    fn check_floor(&self, f: usize) -> Result<(), ControllerError> {
        if f >= self.up.len() {
            return Err(ControllerError::InvalidArgument(format!("floor {f}")));
        }
        Ok(())
    }
}


/// Shared-state simulated controller. Clones drive the same building.
#[derive(Debug, Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    /// Creates a building where every elevator has `capacity`, serves every floor and
    /// stands idle at floor 0 with doors open.
    pub fn new(elevators: usize, floors: usize, capacity: i32, floor_height: i32) -> Self {
        let elevator = SimElevator {
            direction: Direction::Uncommitted,
            door_status: DoorStatus::Open,
            target: 0,
            floor: 0,
            accel: 0,
            speed: 0,
            position: 0,
            weight: 0,
            capacity,
            buttons: vec![false; floors],
            services: vec![true; floors],
            dwell: 0,
        };
        Self {
            state: Arc::new(Mutex::new(SimState {
                elevators: vec![elevator; elevators],
                up: vec![false; floors],
                down: vec![false; floors],
                floor_height,
                clock_tick: 0,
                failing: HashSet::new(),
                offline: false,
            })),
        }
    }

    /// Runs `f` on the state on behalf of controller call `call`, honoring fault injection.
    fn call<T>(&self, call: &'static str, f: impl FnOnce(&mut SimState) -> Result<T, ControllerError>) -> Result<T, ControllerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ControllerError::Remote("simulator state poisoned".to_string()))?;
        if state.offline {
            return Err(ControllerError::Timeout);
        }
        if state.failing.contains(call) {
            return Err(ControllerError::Remote(format!("injected failure in {call}")));
        }
        f(&mut state)
    }

    /// Scripting access, bypassing fault injection.
    fn script(&self, f: impl FnOnce(&mut SimState) -> Result<(), ControllerError>) -> Result<(), ControllerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ControllerError::Remote("simulator state poisoned".to_string()))?;
        f(&mut state)
    }

    // ──────────────────────────────────────────────
    //   Fault injection
    // ──────────────────────────────────────────────

    /// Makes every call named `call` (the trait method name) fail until cleared.
    pub fn fail_call(&self, call: &'static str) {
        let _ = self.script(|s| {
            s.failing.insert(call);
            Ok(())
        });
    }

    /// Clears all injected call failures.
    pub fn clear_failures(&self) {
        let _ = self.script(|s| {
            s.failing.clear();
            Ok(())
        });
    }

    /// While offline every call times out.
    pub fn set_offline(&self, offline: bool) {
        let _ = self.script(|s| {
            s.offline = offline;
            Ok(())
        });
    }

    // ──────────────────────────────────────────────
    //   Scripting
    // ──────────────────────────────────────────────

    /// Presses or releases the hall-call up button at `floor`.
    pub fn press_up(&self, floor: usize, pressed: bool) -> Result<(), ControllerError> {
        self.script(|s| {
            s.check_floor(floor)?;
            s.up[floor] = pressed;
            Ok(())
        })
    }

    /// Presses or releases the hall-call down button at `floor`.
    pub fn press_down(&self, floor: usize, pressed: bool) -> Result<(), ControllerError> {
        self.script(|s| {
            s.check_floor(floor)?;
            s.down[floor] = pressed;
            Ok(())
        })
    }

    /// Presses or releases the inside button for `floor` in `elevator`.
    pub fn press_inside(&self, elevator: usize, floor: usize, pressed: bool) -> Result<(), ControllerError> {
        self.script(|s| {
            s.check_floor(floor)?;
            s.elevator_mut(elevator)?.buttons[floor] = pressed;
            Ok(())
        })
    }

    /// Sets the total passenger weight of `elevator`.
    pub fn set_weight(&self, elevator: usize, weight: i32) -> Result<(), ControllerError> {
        self.script(|s| {
            s.elevator_mut(elevator)?.weight = weight;
            Ok(())
        })
    }

    #[allow(missing_docs)]
    pub fn set_door_status(&self, elevator: usize, status: DoorStatus) -> Result<(), ControllerError> {
        self.script(|s| {
            s.elevator_mut(elevator)?.door_status = status;
            Ok(())
        })
    }

    #[allow(missing_docs)]
    pub fn set_speed(&self, elevator: usize, speed: i32) -> Result<(), ControllerError> {
        self.script(|s| {
            s.elevator_mut(elevator)?.speed = speed;
            Ok(())
        })
    }

    /// Puts `elevator` at `floor` with its target there as well.
    pub fn place(&self, elevator: usize, floor: usize) -> Result<(), ControllerError> {
        self.script(|s| {
            s.check_floor(floor)?;
            let height = s.floor_height;
            let el = s.elevator_mut(elevator)?;
            el.floor = floor;
            el.target = floor;
            el.position = floor as i32 * height;
            Ok(())
        })
    }

    /// Advances the simulation by one step.
    pub fn step(&self) -> Result<(), ControllerError> {
        self.script(|s| {
            s.clock_tick += 1;
            let height = s.floor_height;
            let SimState { elevators, up, down, .. } = s;

            for el in elevators.iter_mut() {
                if el.target == el.floor {
                    el.speed = 0;
                    el.accel = 0;
                    if el.door_status != DoorStatus::Open {
                        el.door_status = DoorStatus::Open;
                        el.dwell = 0;
                        el.buttons[el.floor] = false;
                        up[el.floor] = false;
                        down[el.floor] = false;
                    }
                    continue;
                }

                match el.door_status {
                    DoorStatus::Open | DoorStatus::Opening => {
                        el.dwell += 1;
                        if el.dwell >= config::SIM_DOOR_DWELL_STEPS {
                            el.door_status = DoorStatus::Closing;
                        }
                    }
                    DoorStatus::Closing => el.door_status = DoorStatus::Closed,
                    DoorStatus::Closed => {
                        if el.target > el.floor {
                            el.floor += 1;
                            el.speed = height;
                        } else {
                            el.floor -= 1;
                            el.speed = -height;
                        }
                        el.position = el.floor as i32 * height;
                    }
                }
            }
            Ok(())
        })
    }
}

impl ElevatorController for SimController {
    fn elevator_num(&self) -> Result<usize, ControllerError> {
        self.call("elevator_num", |s| Ok(s.elevators.len()))
    }

    fn floor_num(&self) -> Result<usize, ControllerError> {
        self.call("floor_num", |s| Ok(s.up.len()))
    }

    fn floor_height(&self) -> Result<i32, ControllerError> {
        self.call("floor_height", |s| Ok(s.floor_height))
    }

    fn clock_tick(&self) -> Result<u64, ControllerError> {
        self.call("clock_tick", |s| Ok(s.clock_tick))
    }

    fn committed_direction(&self, elevator: usize) -> Result<Direction, ControllerError> {
        self.call("committed_direction", |s| Ok(s.elevator(elevator)?.direction))
    }

    fn door_status(&self, elevator: usize) -> Result<DoorStatus, ControllerError> {
        self.call("door_status", |s| Ok(s.elevator(elevator)?.door_status))
    }

    fn target(&self, elevator: usize) -> Result<usize, ControllerError> {
        self.call("target", |s| Ok(s.elevator(elevator)?.target))
    }

    fn elevator_floor(&self, elevator: usize) -> Result<usize, ControllerError> {
        self.call("elevator_floor", |s| Ok(s.elevator(elevator)?.floor))
    }

    fn elevator_accel(&self, elevator: usize) -> Result<i32, ControllerError> {
        self.call("elevator_accel", |s| Ok(s.elevator(elevator)?.accel))
    }

    fn elevator_speed(&self, elevator: usize) -> Result<i32, ControllerError> {
        self.call("elevator_speed", |s| Ok(s.elevator(elevator)?.speed))
    }

    fn elevator_position(&self, elevator: usize) -> Result<i32, ControllerError> {
        self.call("elevator_position", |s| Ok(s.elevator(elevator)?.position))
    }

    fn elevator_weight(&self, elevator: usize) -> Result<i32, ControllerError> {
        self.call("elevator_weight", |s| Ok(s.elevator(elevator)?.weight))
    }

    fn elevator_capacity(&self, elevator: usize) -> Result<i32, ControllerError> {
        self.call("elevator_capacity", |s| Ok(s.elevator(elevator)?.capacity))
    }

    fn elevator_button(&self, elevator: usize, floor: usize) -> Result<bool, ControllerError> {
        self.call("elevator_button", |s| {
            s.check_floor(floor)?;
            Ok(s.elevator(elevator)?.buttons[floor])
        })
    }

    fn services_floor(&self, elevator: usize, floor: usize) -> Result<bool, ControllerError> {
        self.call("services_floor", |s| {
            s.check_floor(floor)?;
            Ok(s.elevator(elevator)?.services[floor])
        })
    }

    fn floor_button_up(&self, floor: usize) -> Result<bool, ControllerError> {
        self.call("floor_button_up", |s| {
            s.check_floor(floor)?;
            Ok(s.up[floor])
        })
    }

    fn floor_button_down(&self, floor: usize) -> Result<bool, ControllerError> {
        self.call("floor_button_down", |s| {
            s.check_floor(floor)?;
            Ok(s.down[floor])
        })
    }

    fn set_target(&self, elevator: usize, floor: usize) -> Result<(), ControllerError> {
        self.call("set_target", |s| {
            s.check_floor(floor)?;
            s.elevator_mut(elevator)?.target = floor;
            Ok(())
        })
    }

    fn set_committed_direction(&self, elevator: usize, direction: Direction) -> Result<(), ControllerError> {
        self.call("set_committed_direction", |s| {
            s.elevator_mut(elevator)?.direction = direction;
            Ok(())
        })
    }

    fn set_services_floor(&self, elevator: usize, floor: usize, service: bool) -> Result<(), ControllerError> {
        self.call("set_services_floor", |s| {
            s.check_floor(floor)?;
            s.elevator_mut(elevator)?.services[floor] = service;
            Ok(())
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_building_shape() {
        let sim = SimController::new(3, 7, 12, 10);
        assert_eq!(sim.elevator_num().unwrap(), 3);
        assert_eq!(sim.floor_num().unwrap(), 7);
        assert_eq!(sim.floor_height().unwrap(), 10);
        assert_eq!(sim.elevator_capacity(2).unwrap(), 12);
        assert!(sim.services_floor(0, 6).unwrap());
    }

    #[test]
    fn rejects_out_of_range_arguments() {
        let sim = SimController::new(1, 3, 10, 10);
        assert!(matches!(sim.target(1), Err(ControllerError::InvalidArgument(_))));
        assert!(matches!(sim.set_target(0, 3), Err(ControllerError::InvalidArgument(_))));
        assert!(matches!(sim.floor_button_up(3), Err(ControllerError::InvalidArgument(_))));
    }

    #[test]
    fn injected_failure_hits_only_named_call() {
        let sim = SimController::new(1, 3, 10, 10);
        sim.fail_call("elevator_speed");
        assert!(matches!(sim.elevator_speed(0), Err(ControllerError::Remote(_))));
        assert!(sim.elevator_accel(0).is_ok());

        sim.clear_failures();
        assert!(sim.elevator_speed(0).is_ok());

        sim.set_offline(true);
        assert_eq!(sim.elevator_num(), Err(ControllerError::Timeout));
    }

    #[test]
    fn travels_to_target_and_clears_calls() {
        let sim = SimController::new(1, 4, 10, 10);
        sim.press_up(2, true).unwrap();
        sim.press_inside(0, 2, true).unwrap();
        sim.set_target(0, 2).unwrap();

        for _ in 0..20 {
            sim.step().unwrap();
        }

        assert_eq!(sim.elevator_floor(0).unwrap(), 2);
        assert_eq!(sim.elevator_position(0).unwrap(), 20);
        assert_eq!(sim.door_status(0).unwrap(), DoorStatus::Open);
        assert!(!sim.floor_button_up(2).unwrap());
        assert!(!sim.elevator_button(0, 2).unwrap());
        assert!(sim.clock_tick().unwrap() >= 20);
    }

    #[test]
    fn doors_close_before_moving() {
        let sim = SimController::new(1, 4, 10, 10);
        sim.set_target(0, 1).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.elevator_floor(0).unwrap(), 0);
        assert_ne!(sim.door_status(0).unwrap(), DoorStatus::Closed);
    }
}
