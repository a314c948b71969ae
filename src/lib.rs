#![warn(missing_docs)]
//! # elevatorsync
//!
//! This library mirrors a bank of elevators onto a publish/subscribe bus and dispatches them
//! from the mirrored state.
//!
//! ## Overview
//! - **Config**: Topic strings, wire codes, intervals and print switches.
//! - **Init**: Command-line switches and settings loading.
//! - **Print**: Colour-coded terminal logging.
//! - **Building**: The in-memory building model both sides keep.
//! - **Bus**: Publish/subscribe abstraction, topic scheme and an in-process broker.
//! - **Controller**: The elevator controller interface and a simulator.
//! - **Bridge**: Polls the controller, publishes changes, relays commands, answers snapshots.
//! - **Dispatch**: Rebuilds the building from the bus and decides targets and directions.

/// Global variables
pub mod config;

/// Initialize functions
pub mod init;

/// Print functions with color coding
pub mod print;

pub mod building;

pub mod bus;

pub mod controller;

pub mod bridge;

pub mod dispatch;
