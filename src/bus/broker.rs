//! In-process broker.
//!
//! All publishing, retaining and fan-out happens under one lock, so a subscriber that
//! registers while a publish is in flight sees either the retained value or the live
//! message, never both and never neither.

use crate::bus::{topic_matches, validate_filter, validate_topic, Bus, BusError, BusMessage, Subscription};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};


struct BrokerState {
    /// Retained values, ordered by topic so new subscribers get a stable replay order
    retained: BTreeMap<String, String>,
    subscribers: Vec<(String, mpsc::UnboundedSender<BusMessage>)>,
    connected: bool,
}

struct Inner {
    state: Mutex<BrokerState>,
    session_tx: watch::Sender<u64>,
}


/// In-process MQTT-like broker. Clones share the same broker.
#[derive(Clone)]
pub struct LocalBroker {
    inner: Arc<Inner>,
}

impl LocalBroker {
    /// Creates a connected broker with no retained values and session counter 0.
    pub fn new() -> Self {
        let (session_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState {
                    retained: BTreeMap::new(),
                    subscribers: Vec::new(),
                    connected: true,
                }),
                session_tx,
            }),
        }
    }

    /// Simulates losing or regaining the connection. While disconnected every publish
    /// and subscribe fails with [`BusError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.connected = connected;
        }
    }

    /// Reconnects and starts a new session. Existing subscriptions are kept.
    pub fn reconnect(&self) {
        self.set_connected(true);
        self.inner.session_tx.send_modify(|session| *session += 1);
    }

    /// Current retained value of `topic`, if any.
    pub fn retained(&self, topic: &str) -> Option<String> {
        let state = self.inner.state.lock().ok()?;
        state.retained.get(topic).cloned()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        match self.inner.state.lock() {
            Ok(mut state) => {
                state.subscribers.retain(|(_, tx)| !tx.is_closed());
                state.subscribers.len()
            }
            Err(_) => 0,
        }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for LocalBroker {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        validate_topic(topic)?;
        let mut state = self.inner.state.lock().map_err(|_| BusError::Closed)?;
        if !state.connected {
            return Err(BusError::NotConnected);
        }

        if retain {
            if payload.is_empty() {
                state.retained.remove(topic);
            } else {
                state.retained.insert(topic.to_string(), payload.to_string());
            }
        }

        // Subscribers that hung up are pruned while fanning out
        state.subscribers.retain(|(filter, tx)| {
            if !topic_matches(filter, topic) {
                return !tx.is_closed();
            }
            tx.send(BusMessage::new(topic, payload, false)).is_ok()
        });
        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<Subscription, BusError> {
        validate_filter(filter)?;
        let mut state = self.inner.state.lock().map_err(|_| BusError::Closed)?;
        if !state.connected {
            return Err(BusError::NotConnected);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (topic, payload) in state.retained.iter() {
            if topic_matches(filter, topic) {
                // rx is alive in this scope
                let _ = tx.send(BusMessage::new(topic.as_str(), payload.as_str(), true));
            }
        }
        state.subscribers.push((filter.to_string(), tx));
        Ok(rx)
    }

    fn session(&self) -> watch::Receiver<u64> {
        self.inner.session_tx.subscribe()
    }
}
