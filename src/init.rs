//! ## Startup helpers
//!
//! Command-line switches and the optional JSON settings file read once at startup.

use crate::config;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::{Path, PathBuf}, time::Duration};


/// Runtime settings. Every field falls back to its default in [`crate::config`] when
/// missing from the settings file.
///
/// ## Example file
/// ```json
/// { "building_id": "3", "dispatch_interval_ms": 500, "elevators": 4 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Building id used in every topic
    pub building_id: String,
    /// Bridge poll interval
    pub polling_interval_ms: u64,
    /// Dispatcher decision interval
    pub dispatch_interval_ms: u64,
    /// Time to wait for a snapshot acknowledgment before asking again
    pub snapshot_timeout_ms: u64,
    /// Simulated elevator count
    pub elevators: usize,
    /// Simulated floor count
    pub floors: usize,
    /// Simulated capacity per elevator
    pub capacity: i32,
    /// Simulated floor height
    pub floor_height: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            building_id: config::DEFAULT_BUILDING_ID.to_string(),
            polling_interval_ms: config::POLL_INTERVAL.as_millis() as u64,
            dispatch_interval_ms: config::DISPATCH_INTERVAL.as_millis() as u64,
            snapshot_timeout_ms: config::SNAPSHOT_TIMEOUT.as_millis() as u64,
            elevators: config::DEFAULT_NUM_ELEVATORS,
            floors: config::DEFAULT_NUM_FLOORS,
            capacity: config::DEFAULT_CAPACITY,
            floor_height: config::DEFAULT_FLOOR_HEIGHT,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Settings> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Settings::from_json(&text).with_context(|| format!("parsing settings file {}", path.display()))
    }

    /// Parses settings from JSON text and validates them.
    pub fn from_json(text: &str) -> anyhow::Result<Settings> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.building_id.is_empty(), "building_id must not be empty");
        anyhow::ensure!(
            !self.building_id.contains(['/', '+', '#']),
            "building_id {:?} must be a single topic level",
            self.building_id
        );
        anyhow::ensure!(self.polling_interval_ms > 0, "polling_interval_ms must be positive");
        anyhow::ensure!(self.dispatch_interval_ms > 0, "dispatch_interval_ms must be positive");
        anyhow::ensure!(self.snapshot_timeout_ms > 0, "snapshot_timeout_ms must be positive");
        anyhow::ensure!(self.floors > 0, "a building needs at least one floor");
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    #[allow(missing_docs)]
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    #[allow(missing_docs)]
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}


/// ### Reads arguments from `cargo run`
///
/// Used to modify what is printed during runtime and where settings come from. Available options:
///
/// `settings::<path>` &rarr; Loads [`Settings`] from a JSON file
/// `print_building::(true/false)` &rarr; Prints the dispatcher's building mirror periodically
/// `print_err::(true/false)` &rarr; Prints error messages
/// `print_warn::(true/false)` &rarr; Prints warning messages
/// `print_ok::(true/false)` &rarr; Prints OK messages
/// `print_info::(true/false)` &rarr; Prints informational messages
/// `print_else::(true/false)` &rarr; Prints bridge and dispatcher traffic
/// `debug` &rarr; Disables all prints except error messages
/// `help` &rarr; Displays all possible arguments without starting the program
///
/// If no arguments are provided, all prints are enabled by default.
///
/// ## Returns
/// The settings file path, if one was given.
pub fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg.to_lowercase() == "help") {
        print_help();
        std::process::exit(0);
    }
    apply_args(&args)
}

/// Applies `key::value` switches and returns the settings path, if any.
pub fn apply_args(args: &[String]) -> Option<PathBuf> {
    let mut settings_path = None;

    for arg in args {
        let lower = arg.to_lowercase();
        if lower == "debug" || lower == "debug::" {
            set_flag(&config::PRINT_BUILDING_ON, false);
            set_flag(&config::PRINT_WARN_ON, false);
            set_flag(&config::PRINT_OK_ON, false);
            set_flag(&config::PRINT_INFO_ON, false);
            set_flag(&config::PRINT_ELSE_ON, false);
            continue;
        }

        let Some((key, value)) = arg.split_once("::") else {
            continue;
        };
        let is_true = value.to_lowercase() == "true";

        match key.to_lowercase().as_str() {
            "settings" => settings_path = Some(PathBuf::from(value)),
            "print_building" => set_flag(&config::PRINT_BUILDING_ON, is_true),
            "print_err" => set_flag(&config::PRINT_ERR_ON, is_true),
            "print_warn" => set_flag(&config::PRINT_WARN_ON, is_true),
            "print_ok" => set_flag(&config::PRINT_OK_ON, is_true),
            "print_info" => set_flag(&config::PRINT_INFO_ON, is_true),
            "print_else" => set_flag(&config::PRINT_ELSE_ON, is_true),
            _ => {}
        }
    }
    settings_path
}

fn set_flag(flag: &std::sync::Mutex<bool>, on: bool) {
    if let Ok(mut value) = flag.lock() {
        *value = on;
    }
}

fn print_help() {
    println!("Available arguments:");
    println!("  settings::<path.json>");
    println!("  print_building::true/false");
    println!("  print_err::true/false");
    println!("  print_warn::true/false");
    println!("  print_ok::true/false");
    println!("  print_info::true/false");
    println!("  print_else::true/false");
    println!("  debug (only error messages are shown)");
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = Settings::from_json(r#"{ "building_id": "3", "elevators": 4 }"#).unwrap();
        assert_eq!(settings.building_id, "3");
        assert_eq!(settings.elevators, 4);
        assert_eq!(settings.floors, config::DEFAULT_NUM_FLOORS);
        assert_eq!(settings.dispatch_interval(), config::DISPATCH_INTERVAL);
    }

    #[test]
    fn rejects_building_id_with_topic_separator() {
        assert!(Settings::from_json(r#"{ "building_id": "a/b" }"#).is_err());
        assert!(Settings::from_json(r#"{ "polling_interval_ms": 0 }"#).is_err());
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn settings_switch_returns_path() {
        let args = vec!["print_ok::true".to_string(), "settings::/tmp/b.json".to_string()];
        assert_eq!(apply_args(&args), Some(PathBuf::from("/tmp/b.json")));
    }
}
