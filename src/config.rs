// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thread_count: usize,
    pub thread_name_prefix: String,
    pub max_timeout_ms: u64,
}

/// Supplies the longest time the owner thread may block in one frame.
pub trait FrameBudget: Send + Sync {
    fn max_timeout(&self) -> Duration;

    /// Each of the two phase waits gets half the frame budget.
    fn phase_timeout(&self) -> Duration {
        self.max_timeout() / 2
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_count: num_cpus::get(),
            thread_name_prefix: "frame-worker".to_string(),
            max_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "json" => {
                let contents = fs::read_to_string(path)?;
                let config: Config = serde_json::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: &str) -> Self {
        self.thread_name_prefix = prefix.to_string();
        self
    }

    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Worker count actually used; a zero setting still yields one worker.
    pub fn effective_threads(&self) -> usize {
        self.thread_count.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_timeout_ms == 0 {
            return Err(ConfigError::Validation("max_timeout_ms must be greater than 0".to_string()));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Validation("thread_name_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

impl FrameBudget for Config {
    fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

impl FrameBudget for Duration {
    fn max_timeout(&self) -> Duration {
        *self
    }
}
