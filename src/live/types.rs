//! Live Types: identifiers and reports shared by the registry and dispatcher.

use std::fmt;
use uuid::Uuid;

/// Name of the single broadcast topic.
pub const LIVE_TOPIC: &str = "gpu_live";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Frames dropped because the connection's queue was full.
    pub dropped: usize,
    /// Members whose connection is already gone. They stay registered
    /// until their session tears down.
    pub closed: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub records: usize,
    pub publish: PublishReport,
}
