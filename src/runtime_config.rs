// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_path() -> String {
    "experiments.json".to_string()
}

fn default_persist_interval_secs() -> u64 {
    30
}

fn default_max_arms_per_experiment() -> usize {
    32
}

// =============================================================================
// HeliosConfig
// =============================================================================

/// Top-level runtime configuration for the Helios engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeliosConfig {
    /// Address the REST API binds to. Overridable via `HELIOS_BIND_ADDR`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path of the JSON experiment store file.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// How often the persistence loop writes the store, in seconds.
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,

    /// Upper bound on arms per experiment, enforced at creation.
    #[serde(default = "default_max_arms_per_experiment")]
    pub max_arms_per_experiment: usize,
}

impl Default for HeliosConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            store_path: default_store_path(),
            persist_interval_secs: default_persist_interval_secs(),
            max_arms_per_experiment: default_max_arms_per_experiment(),
        }
    }
}

impl HeliosConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            store_path = %config.store_path,
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = HeliosConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.store_path, "experiments.json");
        assert_eq!(cfg.persist_interval_secs, 30);
        assert_eq!(cfg.max_arms_per_experiment, 32);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: HeliosConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.max_arms_per_experiment, 32);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "bind_addr": "127.0.0.1:9000", "persist_interval_secs": 5 }"#;
        let cfg: HeliosConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.persist_interval_secs, 5);
        assert_eq!(cfg.store_path, "experiments.json");
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = HeliosConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: HeliosConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.bind_addr, cfg2.bind_addr);
        assert_eq!(cfg.store_path, cfg2.store_path);
        assert_eq!(cfg.persist_interval_secs, cfg2.persist_interval_secs);
    }
}
