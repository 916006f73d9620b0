//! Snapshot Encoder: records -> JSON array text.

use crate::gpu::record::GpuRecord;

pub const EMPTY_SNAPSHOT: &str = "[]";

pub fn encode(records: &[GpuRecord]) -> String {
    if records.is_empty() {
        return EMPTY_SNAPSHOT.to_string();
    }
    match serde_json::to_string(records) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode snapshot: {}", e);
            EMPTY_SNAPSHOT.to_string()
        }
    }
}
