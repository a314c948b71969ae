//! ## Dispatch Module
//!
//! Decides where every elevator goes, from a mirror of the building assembled purely from
//! bus traffic, and sends the decisions back as commands for the bridge to relay.
//!
//! ### Submodules
//! - [`algorithm`]: the per-tick decision logic, pure and synchronous.
//! - [`engine`]: bootstrap, snapshot handshake, telemetry application and the tick loop.

pub mod algorithm;
pub mod engine;

pub use algorithm::Command;
pub use engine::{apply_message, Applied, DispatchEngine, DispatchError};
