pub mod config;
pub mod gpu;
pub mod live;
pub mod server;
pub mod dashboard;
pub mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, SamplerConfig};
use crate::gpu::Sampler;
use crate::live::{BroadcastDispatcher, SubscriptionRegistry};
use crate::stats::ServerStats;

// ========================================
// ENGINE
// ========================================

/// Built once at startup and handed to every connection.
/// Cheap to clone (all fields are Arcs).
#[derive(Clone)]
pub struct TopgEngine {
    pub sampler: Arc<Sampler>,
    pub live: Arc<SubscriptionRegistry>,
    pub stats: Arc<ServerStats>,
    pub start_time: Instant,
}

impl TopgEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_sampler(config.sampler.clone())
    }

    pub fn with_sampler(sampler: SamplerConfig) -> Self {
        Self {
            sampler: Arc::new(Sampler::new(sampler)),
            live: Arc::new(SubscriptionRegistry::new()),
            stats: Arc::new(ServerStats::new()),
            start_time: Instant::now(),
        }
    }

    pub fn dispatcher(&self, period: Duration) -> BroadcastDispatcher {
        BroadcastDispatcher::new(
            self.sampler.clone(),
            self.live.clone(),
            self.stats.clone(),
            period,
        )
    }
}
