//! ## Printing Module
//!
//! This module makes logging in the terminal easier to read.
//! Messages are printed in colours depending on the situation, and every category can be
//! switched on or off at runtime through the flags in [`crate::config`].
//! It also provides a table print of a mirrored [`BuildingState`] and a dump of the
//! controller's settings.
use crate::building::{BuildingState, Direction, DoorStatus};
use crate::config;
use crate::controller::{ControllerError, ElevatorController};

use ansi_term::Colour::{self, Green, Red, Yellow, Purple};
use prettytable::{format, row, Table};
use std::sync::Mutex;
use unicode_width::UnicodeWidthStr;

/// Reads a print flag. A poisoned flag counts as enabled.
fn enabled(flag: &Mutex<bool>) -> bool {
    flag.lock().map(|on| *on).unwrap_or(true)
}

/// Prints an error message in red to the terminal.
///
/// If `PRINT_ERR_ON` is `false`, the message will not be printed.
///
/// ## Parameters
/// - `msg`: The error message to print.
///
/// ## Terminal output
/// - "\[ERROR\]:    {}", msg
///
/// ## Example
/// ```
/// use elevatorsync::print;
///
/// print::err("Something went wrong!".to_string());
/// ```
pub fn err(msg: String) {
    if enabled(&config::PRINT_ERR_ON) {
        println!("{}{}\n", Red.paint("[ERROR]:    "), Red.paint(msg));
    }
}

/// Prints a warning message in yellow to the terminal.
///
/// If `PRINT_WARN_ON` is `false`, the message will not be printed.
///
/// ## Parameters
/// - `msg`: The warning message to print.
///
/// ## Terminal output
/// - "\[WARNING\]:  {}", msg
pub fn warn(msg: String) {
    if enabled(&config::PRINT_WARN_ON) {
        println!("{}{}\n", Yellow.paint("[WARNING]:  "), Yellow.paint(msg));
    }
}

/// Prints a success message in green to the terminal.
///
/// If `PRINT_OK_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[OK\]:       {}", msg
pub fn ok(msg: String) {
    if enabled(&config::PRINT_OK_ON) {
        println!("{}{}\n", Green.paint("[OK]:       "), Green.paint(msg));
    }
}

/// Prints an informational message in light blue to the terminal.
///
/// If `PRINT_INFO_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[INFO\]:     {}", msg
pub fn info(msg: String) {
    let light_blue = Colour::RGB(102, 178, 255);
    if enabled(&config::PRINT_INFO_ON) {
        println!("{}{}\n", light_blue.paint("[INFO]:     "), light_blue.paint(msg));
    }
}

/// Prints a bridge message in orange. Gated by `PRINT_ELSE_ON`.
pub fn bridge(msg: String) {
    let orange = Colour::RGB(255, 153, 51);
    if enabled(&config::PRINT_ELSE_ON) {
        println!("{}{}\n", orange.paint("[BRIDGE]:   "), orange.paint(msg));
    }
}

/// Prints a dispatcher message in pink. Gated by `PRINT_ELSE_ON`.
pub fn dispatch(msg: String) {
    let pink = Colour::RGB(255, 51, 255);
    if enabled(&config::PRINT_ELSE_ON) {
        println!("{}{}\n", pink.paint("[DISPATCH]: "), pink.paint(msg));
    }
}

/// Pads the input text to a fixed display width using spaces.
///
/// Accounts for characters that take more than one column (e.g. arrows and symbols),
/// so table cells stay aligned in the terminal.
fn pad_text(text: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(text);
    let padding = width.saturating_sub(visible_width);
    format!("{}{}", text, " ".repeat(padding))
}

/// Returns a coloured and padded label for a boolean, green for `true` and red for `false`.
fn colored_bool_label(value: bool, width: usize) -> String {
    let raw_text = if value { "true" } else { "false" };
    let padded = pad_text(raw_text, width);
    if value {
        Green.paint(padded).to_string()
    } else {
        Red.paint(padded).to_string()
    }
}

fn direction_label(direction: Direction) -> String {
    match direction {
        Direction::Up => Yellow.paint(pad_text("↑ Up", 12)).to_string(),
        Direction::Down => Yellow.paint(pad_text("↓ Down", 12)).to_string(),
        Direction::Uncommitted => Green.paint(pad_text("Idle", 12)).to_string(),
    }
}

fn door_label(status: DoorStatus) -> String {
    match status {
        DoorStatus::Open => Purple.paint(pad_text("Open", 8)).to_string(),
        DoorStatus::Closed => Green.paint(pad_text("Closed", 8)).to_string(),
        _ => Yellow.paint(pad_text(&status.to_string(), 8)).to_string(),
    }
}

/// One character per floor: `●` when set, `·` otherwise, floor 0 first.
fn floor_mask(values: impl Iterator<Item = bool>) -> String {
    values.map(|v| if v { '●' } else { '·' }).collect()
}

/// Logs a mirrored [`BuildingState`] to the terminal as two tables.
///
/// The first table holds the hall calls per floor, the second one row per elevator with
/// its direction, doors, floors, telemetry and the inside-call/service masks.
///
/// # Behavior
/// - If `config::PRINT_BUILDING_ON` is false, the function exits early.
/// - Intended for human-readable monitoring; print at most every few hundred ms.
pub fn building(building: &BuildingState) {
    if !enabled(&config::PRINT_BUILDING_ON) {
        return;
    }

    println!("{}", Purple.bold().paint("┌────────────────────────────────┐"));
    println!("{}", Purple.bold().paint("│         BUILDING STATUS        │"));
    println!("{}", Purple.bold().paint("└────────────────────────────────┘"));

    let mut halls = Table::new();
    halls.set_format(*format::consts::FORMAT_BOX_CHARS);
    halls.set_titles(row!["Floor", "Up", "Down"]);
    for floor in (0..building.num_floors()).rev() {
        let up = building.up_button(floor).unwrap_or(false);
        let down = building.down_button(floor).unwrap_or(false);
        halls.add_row(row![floor, colored_bool_label(up, 5), colored_bool_label(down, 5)]);
    }
    halls.printstd();

    let mut elevators = Table::new();
    elevators.set_format(*format::consts::FORMAT_BOX_CHARS);
    elevators.set_titles(row![
        "ID", "Direction", "Doors", "Floor", "Target", "Height", "Speed", "Accel", "Weight", "Full", "Requested", "Serviced"
    ]);
    for (id, elev) in building.elevators().iter().enumerate() {
        let floors = 0..elev.num_floors();
        let requested = floor_mask(floors.clone().map(|f| elev.floor_requested(f).unwrap_or(false)));
        let serviced = floor_mask(floors.map(|f| elev.floor_to_service(f).unwrap_or(false)));
        elevators.add_row(row![
            id,
            direction_label(elev.direction()),
            door_label(elev.door_status()),
            elev.current_floor(),
            elev.target_floor(),
            elev.current_height(),
            elev.speed(),
            elev.acceleration(),
            elev.current_passengers_weight(),
            colored_bool_label(elev.is_full(), 5),
            requested,
            serviced
        ]);
    }
    elevators.printstd();
    println!();
}

/// Dumps the controller's building settings and every elevator's current values.
///
/// Gated by `PRINT_INFO_ON`. Any failing controller call aborts the dump with its error.
pub fn controller_settings<C: ElevatorController>(controller: &C) -> Result<(), ControllerError> {
    if !enabled(&config::PRINT_INFO_ON) {
        return Ok(());
    }

    let floors = controller.floor_num()?;
    let elevators = controller.elevator_num()?;

    let mut up = String::new();
    let mut down = String::new();
    for floor in 0..floors {
        up.push(if controller.floor_button_up(floor)? { '1' } else { '0' });
        down.push(if controller.floor_button_down(floor)? { '1' } else { '0' });
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row!["ELEVATOR SETTINGS", ""]);
    table.add_row(row!["Current clock tick", controller.clock_tick()?]);
    table.add_row(row!["Number of elevators", elevators]);
    table.add_row(row!["Number of floors", floors]);
    table.add_row(row!["Floor height", controller.floor_height()?]);
    table.add_row(row!["Floor buttons Up pressed", up]);
    table.add_row(row!["Floor buttons Down pressed", down]);

    for e in 0..elevators {
        let mut buttons = String::new();
        for floor in 0..floors {
            buttons.push(if controller.elevator_button(e, floor)? { '1' } else { '0' });
        }
        table.add_row(row![format!("Elevator {e}"), ""]);
        table.add_row(row!["  Floor", controller.elevator_floor(e)?]);
        table.add_row(row!["  Position", controller.elevator_position(e)?]);
        table.add_row(row!["  Target", controller.target(e)?]);
        table.add_row(row!["  Committed direction", controller.committed_direction(e)?]);
        table.add_row(row!["  Door status", controller.door_status(e)?]);
        table.add_row(row!["  Speed", controller.elevator_speed(e)?]);
        table.add_row(row!["  Acceleration", controller.elevator_accel(e)?]);
        table.add_row(row!["  Capacity", controller.elevator_capacity(e)?]);
        table.add_row(row!["  Weight", controller.elevator_weight(e)?]);
        table.add_row(row!["  Buttons pressed", buttons]);
    }
    table.printstd();
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_text_counts_display_width() {
        assert_eq!(pad_text("ab", 4), "ab  ");
        assert_eq!(pad_text("abcdef", 4), "abcdef");
    }

    #[test]
    fn floor_mask_is_one_char_per_floor() {
        assert_eq!(floor_mask([true, false, true].into_iter()), "●·●");
    }
}
