//! ## Bus Module
//!
//! Publish/subscribe transport between the telemetry bridge and the dispatcher.
//!
//! The semantics follow an MQTT broker with at-least-once delivery:
//! - **Retained** messages are remembered per topic and handed to every later subscriber
//!   before any live traffic. Publishing an empty retained payload clears the topic.
//! - **Transient** messages only reach subscribers present at publish time.
//! - Filters use `+` for exactly one level and a trailing `#` for any number of levels.
//!
//! Messages published by one publisher on one topic reach a given subscriber in publish order.
//!
//! ### Submodules
//! - [`broker`]: in-process broker used by the binary and the tests.
//! - [`topics`]: topic construction/parsing and payload codecs.

pub mod broker;
pub mod topics;

pub use broker::LocalBroker;

use thiserror::Error;
use tokio::sync::{mpsc, watch};


/// Errors raised by a bus implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The client currently has no connection to the broker.
    #[error("not connected to broker")]
    NotConnected,

    /// The broker has shut down.
    #[error("broker closed")]
    Closed,

    /// The topic or filter is not usable (empty level, misplaced wildcard).
    #[error("invalid topic or filter: {0:?}")]
    InvalidTopic(String),
}


/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Full topic the message was published on
    pub topic: String,
    /// UTF-8 payload
    pub payload: String,
    /// Delivered from the retained store rather than live
    pub retained: bool,
}

impl BusMessage {
    #[allow(missing_docs)]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, retained: bool) -> Self {
        Self { topic: topic.into(), payload: payload.into(), retained }
    }
}


/// Stream of messages matching one filter.
///
/// Dropping the subscription unsubscribes it.
pub type Subscription = mpsc::UnboundedReceiver<BusMessage>;


/// Publish/subscribe client.
///
/// Implementations must be cheap to clone handles of and usable from both OS threads
/// (the bridge polls on one) and tokio tasks.
pub trait Bus: Send + Sync + 'static {
    /// Publishes `payload` on `topic`. With `retain` the broker keeps the value for
    /// future subscribers; an empty retained payload removes it.
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError>;

    /// Subscribes to every topic matching `filter`. Retained matches are delivered first.
    fn subscribe(&self, filter: &str) -> Result<Subscription, BusError>;

    /// Session counter. Changes every time the client (re)connects, so a consumer that
    /// watches it can redo any handshake it depends on.
    fn session(&self) -> watch::Receiver<u64>;
}


/// Checks whether `topic` matches MQTT filter `filter`.
///
/// ## Example
/// ```
/// use elevatorsync::bus::topic_matches;
///
/// assert!(topic_matches("buildings/0/#", "buildings/0/NrFloors"));
/// assert!(topic_matches("buildings/+/NrFloors", "buildings/7/NrFloors"));
/// assert!(!topic_matches("buildings/+", "buildings/0/NrFloors"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Validates a publish topic: non-empty and free of wildcards.
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() || topic.contains('+') || topic.contains('#') {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Validates a subscription filter: `#` only as the whole last level, `+` only as a whole level.
pub fn validate_filter(filter: &str) -> Result<(), BusError> {
    if filter.is_empty() {
        return Err(BusError::InvalidTopic(filter.to_string()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let is_last = i + 1 == levels.len();
        if level.contains('#') && (!is_last || *level != "#") {
            return Err(BusError::InvalidTopic(filter.to_string()));
        }
        if level.contains('+') && *level != "+" {
            return Err(BusError::InvalidTopic(filter.to_string()));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_level_wildcard_matches_subtree() {
        assert!(topic_matches("buildings/0/#", "buildings/0/elevators/1/SetTarget"));
        assert!(topic_matches("#", "buildings/0/NrFloors"));
        assert!(!topic_matches("buildings/1/#", "buildings/0/NrFloors"));
    }

    #[test]
    fn single_level_wildcard_matches_one_level() {
        assert!(topic_matches("buildings/0/elevators/+/SetTarget", "buildings/0/elevators/3/SetTarget"));
        assert!(!topic_matches("buildings/0/elevators/+/SetTarget", "buildings/0/elevators/3/4/SetTarget"));
    }

    #[test]
    fn exact_filter_needs_exact_topic() {
        assert!(topic_matches("buildings/0/NrFloors", "buildings/0/NrFloors"));
        assert!(!topic_matches("buildings/0/NrFloors", "buildings/0/NrFloors/x"));
        assert!(!topic_matches("buildings/0/NrFloors/x", "buildings/0/NrFloors"));
    }

    #[test]
    fn filter_validation() {
        assert!(validate_filter("buildings/+/#").is_ok());
        assert!(validate_filter("buildings/#/x").is_err());
        assert!(validate_filter("buildings/a+").is_err());
        assert!(validate_filter("").is_err());
        assert!(validate_topic("buildings/+").is_err());
        assert!(validate_topic("buildings/0").is_ok());
    }
}
