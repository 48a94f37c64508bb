//! Bot configuration.
//!
//! One JSON document with a section per component. Every field has a default,
//! so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub link: LinkConfig,
    pub script: ScriptConfig,
    pub worker: WorkerConfig,
    pub queue: QueueConfig,
    pub catalog: CatalogConfig,
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("script.poll_interval_ms must be non-zero"));
        }
        if self.script.trace_capacity == 0 {
            return Err(ConfigError::Invalid("script.trace_capacity must be non-zero"));
        }
        if self.link.report_interval_ms == 0 {
            return Err(ConfigError::Invalid("link.report_interval_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Controller link client and device endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address the device endpoint listens on and the client connects to.
    /// Default: 0.0.0.0:3000 / 127.0.0.1:3000
    pub listen_addr: String,
    pub connect_addr: String,

    /// HID gadget character device written by the endpoint.
    pub device_path: PathBuf,

    /// Report period of the emulated controller.
    /// Default: 8 ms
    pub report_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            connect_addr: "127.0.0.1:3000".to_string(),
            device_path: PathBuf::from("/dev/hidg0"),
            report_interval_ms: 8,
        }
    }
}

impl LinkConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Default button hold.
    /// Default: 160 ms
    pub hold_ms: u64,

    /// Screen predicate poll interval.
    /// Default: 100 ms
    pub poll_interval_ms: u64,

    /// Recent-input ring buffer size.
    /// Default: 32
    pub trace_capacity: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            hold_ms: 160,
            poll_interval_ms: 100,
            trace_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Ceiling on the counterparty wait.
    /// Default: 180 s
    pub trade_timeout_secs: u64,

    /// Idle keepalive period.
    /// Default: 100 ms
    pub keepalive_interval_ms: u64,

    /// Re-queues allowed per request after communication errors.
    /// Default: unbounded
    pub max_communication_retries: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            trade_timeout_secs: 180,
            keepalive_interval_ms: 100,
            max_communication_retries: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Depth above which common items are refused.
    /// Default: 20
    pub common_item_depth: usize,

    /// Persisted queue snapshot.
    pub snapshot_path: PathBuf,

    /// Persisted trade statistics.
    pub stats_path: PathBuf,

    /// Entries shown by ListQueue.
    /// Default: 10
    pub list_limit: usize,

    /// How long the manager blocks on its inbox before polling completions.
    /// Default: 50 ms
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            common_item_depth: 20,
            snapshot_path: PathBuf::from("queue.tbqs"),
            stats_path: PathBuf::from("stats.json"),
            list_limit: 10,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding chips.json, megachips.json, untradable.json,
    /// navicust.json and optionally common_items.json.
    pub data_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}
