//! Dispatcher tunables.
//!
//! Read once and handed to the command factory and the distribution commands;
//! nothing below consults process-wide state.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DispatchError, Result};

/// HTTP timeouts used by every index client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub connect_timeout_ms: u64,
    /// Applies to every call without a dedicated timeout below.
    pub read_timeout_ms: u64,
    /// `commit` and `softcommit`.
    pub commit_read_timeout_ms: u64,
    pub optimize_read_timeout_ms: u64,
    /// Server-side ingestion through `stream.file`.
    pub stream_file_read_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            read_timeout_ms: 120_000,
            commit_read_timeout_ms: 600_000,
            optimize_read_timeout_ms: 3_600_000,
            stream_file_read_timeout_ms: 21_600_000,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn commit_read_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_read_timeout_ms)
    }

    pub fn optimize_read_timeout(&self) -> Duration {
        Duration::from_millis(self.optimize_read_timeout_ms)
    }

    pub fn stream_file_read_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_file_read_timeout_ms)
    }
}

/// Full dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub client: ClientConfig,
    /// Data lines per bulk chunk, header excluded.
    pub max_lines_per_chunk: usize,
    /// Multiplied by the target count to bound in-flight chunk uploads.
    pub thread_factor: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            max_lines_per_chunk: 100,
            thread_factor: 3.0,
        }
    }
}

impl DispatchConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| DispatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_lines_per_chunk == 0 {
            return Err(DispatchError::Config(
                "max_lines_per_chunk must be at least 1".to_string(),
            ));
        }
        if !self.thread_factor.is_finite() || self.thread_factor <= 0.0 {
            return Err(DispatchError::Config(format!(
                "thread_factor must be positive, got {}",
                self.thread_factor
            )));
        }
        Ok(())
    }

    /// Upper bound of concurrent chunk uploads in one wave, never below one.
    pub fn worker_count(&self, node_count: usize) -> usize {
        ((node_count as f64) * self.thread_factor).round().max(1.0) as usize
    }
}
