//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use swingsense_core::{ConnectionConfig, ReconnectOptions, SupervisorConfig};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory the `<base>/` recording folder is created in
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Reconnection backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Discovery timing
    #[serde(default)]
    pub scan: ScanConfig,

    /// Link liveness poll interval in milliseconds (at most 1000)
    #[serde(default)]
    pub liveness_interval_ms: Option<u64>,

    /// BLE connect timeout in seconds
    #[serde(default)]
    pub connection_timeout_secs: Option<u64>,
}

/// `[reconnect]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

/// `[scan]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub rescan_delay_ms: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swingsense")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to parse config {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
            }
        }
        Self::default()
    }

    /// Build and validate the supervisor settings.
    pub fn supervisor_config(&self) -> Result<SupervisorConfig> {
        let defaults = SupervisorConfig::default();

        let mut reconnect = ReconnectOptions::default();
        if let Some(ms) = self.reconnect.initial_delay_ms {
            reconnect = reconnect.initial_delay(Duration::from_millis(ms));
        }
        if let Some(multiplier) = self.reconnect.multiplier {
            reconnect = reconnect.backoff_multiplier(multiplier);
        }
        if let Some(ms) = self.reconnect.max_delay_ms {
            reconnect = reconnect.max_delay(Duration::from_millis(ms));
        }

        let config = SupervisorConfig::new()
            .reconnect(reconnect)
            .scan_timeout(
                self.scan
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.scan_timeout),
            )
            .rescan_delay(
                self.scan
                    .rescan_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.rescan_delay),
            )
            .liveness_interval(
                self.liveness_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.liveness_interval),
            );

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Build and validate the BLE connection timeouts.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = ConnectionConfig::default();
        if let Some(secs) = self.connection_timeout_secs {
            config = config.connection_timeout(Duration::from_secs(secs));
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Root directory for recordings: the flag, then the config, then `.`.
    pub fn output_root(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
