//! GPU Record: one device's measurement within a snapshot.

use serde::Serialize;

/// Field names follow the `nvidia-smi --query-gpu` vocabulary so the wire
/// format matches what clients already chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuRecord {
    pub index: u32,
    pub name: String,
    #[serde(rename = "utilization.gpu")]
    pub utilization_gpu_pct: u32,
    #[serde(rename = "utilization.memory")]
    pub utilization_mem_pct: u32,
    #[serde(rename = "memory.total")]
    pub memory_total_mib: u64,
    #[serde(rename = "memory.free")]
    pub memory_free_mib: u64,
    #[serde(rename = "memory.used")]
    pub memory_used_mib: u64,
    #[serde(rename = "temperature.gpu")]
    pub temperature_c: i32,
}

/// One poll cycle, in the order the data source reported the devices.
pub type Snapshot = Vec<GpuRecord>;
