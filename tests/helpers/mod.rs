#![allow(dead_code)]

use std::time::Duration;

use axum::extract::ws::Message;
use tempfile::TempDir;
use tokio::sync::mpsc;
use topg::config::SamplerConfig;
use topg::TopgEngine;

pub const TWO_GPUS: &str = "0, NVIDIA GeForce RTX 3080, 12, 3, 10240, 407, 9467, 40\n\
                            1, NVIDIA GeForce RTX 3090, 99, 71, 24576, 1024, 23552, 77\n";

pub const WAIT: Duration = Duration::from_secs(3);

/// Data source that prints `output` (via `cat` on a scratch file).
pub fn file_sampler(output: &str) -> (SamplerConfig, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("nvidia-smi.csv");
    std::fs::write(&path, output).unwrap();
    let config = SamplerConfig::command("cat", &[path.to_str().unwrap()], Duration::from_secs(2));
    (config, temp_dir)
}

/// Data source that cannot be started.
pub fn missing_sampler() -> SamplerConfig {
    SamplerConfig::command("/nonexistent/topg-nvidia-smi", &[], Duration::from_secs(2))
}

pub fn setup_engine(output: &str) -> (TopgEngine, TempDir) {
    let (config, temp_dir) = file_sampler(output);
    (TopgEngine::with_sampler(config), temp_dir)
}

pub async fn recv_text(rx: &mut mpsc::Receiver<Message>) -> String {
    let msg = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("channel closed");
    match msg {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

pub fn json(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|e| panic!("invalid JSON {:?}: {}", text, e))
}
