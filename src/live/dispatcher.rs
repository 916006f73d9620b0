//! Broadcast Dispatcher: periodic sample -> encode -> fan-out.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::gpu::encoder::encode;
use crate::gpu::Sampler;
use crate::live::registry::SubscriptionRegistry;
use crate::live::types::TickReport;
use crate::stats::ServerStats;

pub struct BroadcastDispatcher {
    sampler: Arc<Sampler>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<ServerStats>,
    period: Duration,
}

impl BroadcastDispatcher {
    pub fn new(
        sampler: Arc<Sampler>,
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<ServerStats>,
        period: Duration,
    ) -> Self {
        Self {
            sampler,
            registry,
            stats,
            period,
        }
    }

    /// One cycle. An empty snapshot is still broadcast as `[]`.
    pub async fn tick(&self) -> TickReport {
        let records = self.sampler.capture().await;
        let frame = Message::Text(encode(&records).into());
        let publish = self.registry.publish(frame);
        self.stats.record_tick();

        tracing::debug!(
            "Tick: {} records -> {} delivered, {} dropped, {} closed",
            records.len(),
            publish.delivered,
            publish.dropped,
            publish.closed
        );

        TickReport {
            records: records.len(),
            publish,
        }
    }

    /// Ticks until `shutdown` fires. A tick overrunning the period delays the
    /// next one; missed ticks are skipped, never queued.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Broadcasting '{}' every {}ms",
            self.registry.topic(),
            self.period.as_millis()
        );

        loop {
            tokio::select! {
                // Checked first: after a long tick both branches may be ready.
                biased;

                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Broadcast dispatcher stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
