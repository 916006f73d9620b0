use std::env;
use std::fmt;
use std::time::Duration;

use crate::gpu::sampler::QUERY_FIELDS;

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sampler: SamplerConfig,
    pub live: LiveConfig,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Ok(Self {
            server: ServerConfig::load()?,
            sampler: SamplerConfig::load()?,
            live: LiveConfig::load()?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config error: {} has invalid value '{}'", self.key, self.value)
    }
}

impl std::error::Error for ConfigError {}

// --- MODULES ---

// SERVER
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub client_buffer: usize,
    pub ping_interval: Duration,
    pub max_message_bytes: usize,
}

impl ServerConfig {
    fn load() -> Result<Self, ConfigError> {
        let ping_secs: u64 = get_env_positive("TOPG_PING_SECS", "10")?;
        Ok(Self {
            host:              get_env("TOPG_HOST", "0.0.0.0")?,
            port:              get_env("TOPG_PORT", "8080")?,
            log_level:         get_env("TOPG_LOG", "info")?,
            client_buffer:     get_env("TOPG_CLIENT_BUFFER", "32")?,
            ping_interval:     Duration::from_secs(ping_secs),
            max_message_bytes: get_env("TOPG_MAX_MESSAGE_BYTES", "16384")?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            client_buffer: 32,
            ping_interval: Duration::from_secs(10),
            max_message_bytes: 16 * 1024,
        }
    }
}

// SAMPLER
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Executable invoked on every sampling pass.
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl SamplerConfig {
    fn load() -> Result<Self, ConfigError> {
        let timeout_ms: u64 = get_env_positive("TOPG_SAMPLE_TIMEOUT_MS", "5000")?;
        Ok(Self {
            program: get_env("TOPG_SMI_PATH", "nvidia-smi")?,
            args:    nvidia_smi_args(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Runs an arbitrary command instead of `nvidia-smi`.
    pub fn command(program: &str, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            program: "nvidia-smi".to_string(),
            args: nvidia_smi_args(),
            timeout: Duration::from_millis(5000),
        }
    }
}

fn nvidia_smi_args() -> Vec<String> {
    vec![
        format!("--query-gpu={}", QUERY_FIELDS.join(",")),
        "--format=csv,noheader,nounits".to_string(),
    ]
}

// LIVE
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub interval: Duration,
}

impl LiveConfig {
    fn load() -> Result<Self, ConfigError> {
        let interval_ms: u64 = get_env_positive("TOPG_INTERVAL_MS", "1000")?;
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
        })
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
        }
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|_| ConfigError {
        key: key.to_string(),
        value: raw,
    })
}

/// Like `get_env`, but 0 is an error: these values are periods and timeouts.
fn get_env_positive(key: &str, default: &str) -> Result<u64, ConfigError> {
    match get_env::<u64>(key, default)? {
        0 => Err(ConfigError {
            key: key.to_string(),
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}
