//! Configuration loading

use anyhow::Result;
use netree_core::DeletePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON snapshot of the device tree
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Save the snapshot after every successful change
    #[serde(default = "default_true")]
    pub persist: bool,
    /// What happens to the children of a deleted device
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            persist: true,
            delete_policy: DeletePolicy::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./network.json")
}

fn default_true() -> bool {
    true
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:5001");
        assert_eq!(config.store.path, PathBuf::from("./network.json"));
        assert!(config.store.persist);
        assert_eq!(config.store.delete_policy, DeletePolicy::Reparent);
    }

    #[test]
    fn test_store_section() {
        let config: Config = toml::from_str(
            r#"
            [daemon]
            bind = "127.0.0.1:9000"

            [store]
            path = "/var/lib/netree/tree.json"
            persist = false
            delete_policy = "cascade"
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.store.path, PathBuf::from("/var/lib/netree/tree.json"));
        assert!(!config.store.persist);
        assert_eq!(config.store.delete_policy, DeletePolicy::Cascade);
    }

    #[test]
    fn test_unknown_delete_policy_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[store]\ndelete_policy = \"orphan\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("netree.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:5001");
    }
}
