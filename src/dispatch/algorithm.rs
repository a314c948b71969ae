//! Dispatch decisions.
//!
//! Pure functions over a [`BuildingState`]: no bus, no locking. The engine hands them
//! the private copy it took for the current tick.
//!
//! Each elevator is a small state machine evaluated once per tick, in index order:
//! - doors not open: skipped
//! - uncommitted: head for the nearest floor that needs service
//! - committed: keep going to the nearest floor ahead, else turn around, else go idle
//!
//! Floors chosen for one elevator are off limits for the rest of the tick.

use crate::building::{BuildingError, BuildingState, Direction, DoorStatus};

use std::collections::HashSet;


/// A change the dispatcher wants relayed to the controller.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetTarget { elevator: usize, floor: usize },
    SetCommittedDirection { elevator: usize, direction: Direction },
}


/// Whether elevator `elevator` should stop at `floor`.
///
/// The floor must be in the elevator's service zone, and either requested from inside the
/// cab or have a hall call while the elevator is not full. A full elevator still honors
/// its inside calls.
pub fn should_service_floor(building: &BuildingState, elevator: usize, floor: usize) -> Result<bool, BuildingError> {
    let el = building.elevator(elevator)?;
    if !el.floor_to_service(floor)? {
        return Ok(false);
    }
    if el.floor_requested(floor)? {
        return Ok(true);
    }
    Ok(building.hall_call(floor)? && !el.is_full())
}

/// Nearest floor to `start` that `elevator` should service and nobody claimed yet.
///
/// `start` itself is never returned. At equal distance the lower floor wins.
///
/// ## Returns
/// `None` when no floor qualifies.
pub fn find_nearest_request(
    building: &BuildingState,
    elevator: usize,
    start: usize,
    claimed: &HashSet<usize>,
) -> Result<Option<usize>, BuildingError> {
    let floors = building.num_floors();
    for distance in 1..floors {
        let below = start.checked_sub(distance);
        let above = Some(start + distance).filter(|f| *f < floors);
        for floor in [below, above].into_iter().flatten() {
            if !claimed.contains(&floor) && should_service_floor(building, elevator, floor)? {
                return Ok(Some(floor));
            }
        }
    }
    Ok(None)
}

/// First floor strictly beyond `from` in `direction` that `elevator` should service
/// and nobody claimed yet, nearest first.
pub fn scan(
    building: &BuildingState,
    elevator: usize,
    from: usize,
    direction: Direction,
    claimed: &HashSet<usize>,
) -> Result<Option<usize>, BuildingError> {
    let candidates: Box<dyn Iterator<Item = usize>> = match direction {
        Direction::Up => Box::new(from + 1..building.num_floors()),
        Direction::Down => Box::new((0..from.min(building.num_floors())).rev()),
        Direction::Uncommitted => return Ok(None),
    };
    for floor in candidates {
        if !claimed.contains(&floor) && should_service_floor(building, elevator, floor)? {
            return Ok(Some(floor));
        }
    }
    Ok(None)
}

/// Direction pointing from `from` towards `to`.
fn heading(from: usize, to: usize) -> Direction {
    if to > from { Direction::Up } else { Direction::Down }
}

/// Runs one dispatch tick on `building` and returns the commands to publish.
///
/// `building` is updated with every decision so it reflects the state the commands will
/// produce. Only values that actually change yield a command.
pub fn plan(building: &mut BuildingState) -> Result<Vec<Command>, BuildingError> {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut commands = Vec::new();

    for elevator in 0..building.num_elevators() {
        let el = building.elevator(elevator)?;
        if el.door_status() != DoorStatus::Open {
            continue;
        }
        let (direction, current, target) = (el.direction(), el.current_floor(), el.target_floor());

        let decision = match direction {
            Direction::Uncommitted => {
                find_nearest_request(building, elevator, current, &claimed)?.map(|f| (heading(current, f), f))
            }
            Direction::Up | Direction::Down => match scan(building, elevator, current, direction, &claimed)? {
                Some(f) => Some((direction, f)),
                None => scan(building, elevator, current, direction.opposite(), &claimed)?
                    .map(|f| (direction.opposite(), f)),
            },
        };

        let (new_direction, new_target) = match decision {
            Some((d, f)) => {
                claimed.insert(f);
                (d, f)
            }
            None => (Direction::Uncommitted, target),
        };

        if new_direction != direction {
            building.set_direction(elevator, new_direction)?;
            commands.push(Command::SetCommittedDirection { elevator, direction: new_direction });
        }
        if new_target != target {
            building.set_target_floor(elevator, new_target)?;
            commands.push(Command::SetTarget { elevator, floor: new_target });
        }
    }
    Ok(commands)
}
