//! Sampler: runs the external GPU query tool and returns its raw output.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::config::SamplerConfig;
use crate::gpu::encoder::encode;
use crate::gpu::parser::parse;
use crate::gpu::record::Snapshot;

/// Fields requested from `nvidia-smi`, in the order the parser expects them.
pub const QUERY_FIELDS: [&str; 8] = [
    "index",
    "name",
    "utilization.gpu",
    "utilization.memory",
    "memory.total",
    "memory.free",
    "memory.used",
    "temperature.gpu",
];

/// The data source could not produce output this pass.
#[derive(Debug)]
pub enum SampleError {
    Spawn(std::io::Error),
    Exit { status: ExitStatus, stderr: String },
    EmptyOutput,
    Timeout(Duration),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Spawn(e) => write!(f, "failed to run data source: {}", e),
            SampleError::Exit { status, stderr } => {
                write!(f, "data source exited with {}: {}", status, stderr)
            }
            SampleError::EmptyOutput => write!(f, "data source produced no output"),
            SampleError::Timeout(d) => write!(f, "data source timed out after {}ms", d.as_millis()),
        }
    }
}

impl std::error::Error for SampleError {}

pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// One raw invocation. The child is killed if the timeout elapses.
    pub async fn sample(&self) -> Result<String, SampleError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(SampleError::Spawn)?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(SampleError::Spawn(e)),
            Err(_) => return Err(SampleError::Timeout(self.config.timeout)),
        };

        if !output.status.success() {
            return Err(SampleError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(SampleError::EmptyOutput);
        }
        Ok(stdout)
    }

    /// Sample and parse. An unavailable source yields an empty snapshot.
    pub async fn capture(&self) -> Snapshot {
        match self.sample().await {
            Ok(raw) => parse(&raw),
            Err(e) => {
                tracing::warn!("GPU source unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Full Sampler -> Parser -> Encoder pass.
    pub async fn capture_json(&self) -> String {
        encode(&self.capture().await)
    }
}
