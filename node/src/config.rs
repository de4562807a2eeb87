//! # Node Configuration
//!
//! `config.json` in the data directory. Every field has a default, so a
//! partial file (or none at all) is valid. Port flags on the command line
//! take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use assetvault_registry::RegistryConfig;

/// Default REST API port.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Default logical clock tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub api_port: u16,
    pub metrics_port: u16,
    /// How often the logical clock advances by one.
    pub tick_interval_ms: u64,
    /// Input limits handed to the registry.
    pub registry: RegistryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            registry: RegistryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`NodeConfig::load`], but returns the defaults when `path` does
    /// not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to encode config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be positive");
        }
        if self.api_port == self.metrics_port {
            anyhow::bail!("api_port and metrics_port must differ ({})", self.api_port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = NodeConfig::default();
        config.api_port = 7000;
        config.registry.max_id_length = 16;
        config.save(&path).unwrap();

        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "metrics_port": 9100 }"#).unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "tick_interval_ms": 0 }"#).unwrap();
        assert!(NodeConfig::load(&path).is_err());
    }
}
