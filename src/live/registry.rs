//! Subscription Registry: connections that receive the live topic.
//!
//! Holds only the sending half of each connection's outbound queue; the
//! connection itself is owned by its session. DashMap shards make
//! subscribe/unsubscribe and broadcast iteration mutually exclusive per
//! entry without a global lock.

use axum::extract::ws::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::live::types::{ConnectionId, PublishReport, LIVE_TOPIC};

pub struct SubscriptionRegistry {
    topic: &'static str,
    subscribers: DashMap<ConnectionId, mpsc::Sender<Message>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            topic: LIVE_TOPIC,
            subscribers: DashMap::new(),
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Returns false if the connection was already a member.
    pub fn subscribe(&self, id: ConnectionId, sender: mpsc::Sender<Message>) -> bool {
        match self.subscribers.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(sender);
                true
            }
        }
    }

    /// Returns false if the connection was not a member.
    pub fn unsubscribe(&self, id: &ConnectionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_subscribed(&self, id: &ConnectionId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Fire-and-forget delivery to every member. Never waits on a queue.
    ///
    /// A closed queue is only counted: the owning session removes its own
    /// membership when it tears down.
    pub fn publish(&self, frame: Message) -> PublishReport {
        let mut report = PublishReport::default();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Dropping {} frame for slow connection {}", self.topic, entry.key());
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!("Connection {} on {} already closed", entry.key(), self.topic);
                    report.closed += 1;
                }
            }
        }

        report
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
