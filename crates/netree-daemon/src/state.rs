//! Application state management

use anyhow::{Context, Result};
use netree_core::{persist, Hierarchy, TraversalMethod};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// The device tree and its operations
    pub hierarchy: Hierarchy,
    /// Configuration
    pub config: Config,
    /// Serializes snapshot writes so an older tree never lands last
    save_lock: Mutex<()>,
}

impl AppState {
    /// Create application state, loading the snapshot file if there is one
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let path = &config.store.path;
        let store = persist::load_or_create(path)
            .with_context(|| format!("failed to load device snapshot {}", path.display()))?;

        if store.is_empty() {
            info!(path = %path.display(), "Starting with an empty device tree");
        } else {
            info!(path = %path.display(), devices = store.len(), "Loaded device tree");
        }

        Ok(Self::with_hierarchy(
            Hierarchy::from_store(store, config.store.delete_policy),
            config,
        ))
    }

    pub fn with_hierarchy(hierarchy: Hierarchy, config: Config) -> Arc<Self> {
        Arc::new(Self {
            hierarchy,
            config,
            save_lock: Mutex::new(()),
        })
    }

    /// Write the current tree to the snapshot file.
    ///
    /// Failures are logged, not returned: the change that triggered the save
    /// has already been applied in memory.
    pub async fn persist(&self) {
        if !self.config.store.persist {
            return;
        }

        let _guard = self.save_lock.lock().await;
        let records = self.hierarchy.traverse(TraversalMethod::Dfs);
        let devices = records.len();
        let path = self.config.store.path.clone();
        let target = path.clone();

        match tokio::task::spawn_blocking(move || persist::save_records(&records, &target)).await {
            Ok(Ok(())) => debug!(path = %path.display(), devices, "Saved device tree"),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to save device tree"),
            Err(e) => warn!(path = %path.display(), error = %e, "Snapshot writer task failed"),
        }
    }
}
