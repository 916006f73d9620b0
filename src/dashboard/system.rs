use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::server::network::AppState;
use crate::TopgEngine;

#[derive(Debug, Serialize)]
pub struct SystemSnapshot {
    pub uptime_seconds: u64,
    pub server_time: String,
    pub topic: &'static str,
    pub connections: usize,
    pub connections_total: u64,
    pub live_subscribers: usize,
    pub ticks: u64,
    pub snapshots_served: u64,
}

impl SystemSnapshot {
    pub fn capture(engine: &TopgEngine) -> Self {
        Self {
            uptime_seconds: engine.start_time.elapsed().as_secs(),
            server_time: chrono::Utc::now().to_rfc3339(),
            topic: engine.live.topic(),
            connections: engine.stats.connections(),
            connections_total: engine.stats.connections_total(),
            live_subscribers: engine.live.len(),
            ticks: engine.stats.ticks(),
            snapshots_served: engine.stats.snapshots_served(),
        }
    }
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(SystemSnapshot::capture(&state.engine))
}
