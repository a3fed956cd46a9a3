//! Scheduler configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::Rate;

/// Scheduler configuration
///
/// Every limit is optional; an absent limit means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target dispatch rate. Absent means dispatch as fast as concurrency allows.
    #[serde(rename = "requests-per-second", skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,

    /// Max tasks in flight at once
    #[serde(rename = "max-concurrent", skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,

    /// Max tasks waiting in the queue
    #[serde(rename = "max-queued", skip_serializing_if = "Option::is_none")]
    pub max_queued: Option<usize>,

    /// Start ticking as soon as the scheduler is constructed
    #[serde(rename = "auto-start")]
    pub auto_start: bool,
}

impl SchedulerConfig {
    pub fn with_rate(mut self, requests_per_second: f64) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn with_max_queued(mut self, max_queued: usize) -> Self {
        self.max_queued = Some(max_queued);
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// The configured rate, `Rate::Unbounded` when absent
    pub fn rate(&self) -> Rate {
        self.requests_per_second.and_then(Rate::new).unwrap_or(Rate::Unbounded)
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if let Some(rps) = self.requests_per_second {
            if rps.is_nan() || rps <= 0.0 {
                return Err(eyre::eyre!("requests-per-second must be positive, got {}", rps));
            }
        }
        if self.max_concurrent == Some(0) {
            return Err(eyre::eyre!("max-concurrent must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .ratequeue.yml
        let local_config = PathBuf::from(".ratequeue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/ratequeue/ratequeue.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ratequeue").join("ratequeue.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid scheduler config")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
