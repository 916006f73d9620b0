use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Process-lifetime counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    connections: AtomicUsize,
    connections_total: AtomicU64,
    ticks: AtomicU64,
    snapshots_served: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of open connections including this one.
    pub fn connection_opened(&self) -> usize {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the number of connections still open.
    pub fn connection_closed(&self) -> usize {
        let prev = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self) {
        self.snapshots_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn snapshots_served(&self) -> u64 {
        self.snapshots_served.load(Ordering::Relaxed)
    }
}
