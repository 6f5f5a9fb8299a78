//! JSON snapshot of the device tree
//!
//! The file is a flat array of device records (`id`, `type`, `name`,
//! `parent_id`, `status`). No adjacency is stored: the tree is rebuilt from
//! the parent links. Records are written in depth-first order, so parents
//! precede children and sibling order survives a save/load cycle.

use std::path::Path;
use thiserror::Error;

use crate::device::{Device, DeviceId};
use crate::store::{DeviceStore, StoreError};
use crate::traversal;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid snapshot: {0}")]
    Rebuild(#[from] StoreError),
    #[error("Devices never attach to the tree: {0:?}")]
    Orphaned(Vec<DeviceId>),
    #[error("Device {id} has a blank name")]
    BlankName { id: DeviceId },
}

/// Records of every device in depth-first order
pub fn records(store: &DeviceStore) -> Vec<Device> {
    traversal::traverse(store, traversal::TraversalMethod::Dfs)
}

/// Rebuild a store from flat records in any order.
///
/// Records wait until their parent is present. Anything still waiting once
/// no more progress is possible (missing parent, or a loop of parent links)
/// is reported as [`PersistError::Orphaned`]. Names must not be blank,
/// the same rule the hierarchy applies to requests.
pub fn rebuild(records: Vec<Device>) -> Result<DeviceStore, PersistError> {
    if let Some(device) = records.iter().find(|d| d.name.trim().is_empty()) {
        return Err(PersistError::BlankName { id: device.id });
    }

    let mut store = DeviceStore::new();
    let mut pending = records;

    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = Vec::new();

        for device in pending {
            match device.parent_id {
                Some(parent_id) if !store.contains(parent_id) => waiting.push(device),
                _ => store.add(device)?,
            }
        }

        if waiting.len() == before {
            return Err(PersistError::Orphaned(waiting.into_iter().map(|d| d.id).collect()));
        }
        pending = waiting;
    }

    Ok(store)
}

/// Read a snapshot file
pub fn from_file(path: &Path) -> Result<DeviceStore, PersistError> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<Device> = serde_json::from_str(&content)?;
    rebuild(records)
}

/// Read a snapshot file, or start empty if it does not exist
pub fn load_or_create(path: &Path) -> Result<DeviceStore, PersistError> {
    if path.exists() {
        from_file(path)
    } else {
        Ok(DeviceStore::new())
    }
}

/// Write a snapshot file
pub fn save(store: &DeviceStore, path: &Path) -> Result<(), PersistError> {
    save_records(&records(store), path)
}

/// Write already collected records, e.g. copied out from under a lock
pub fn save_records(records: &[Device], path: &Path) -> Result<(), PersistError> {
    let content = serde_json::to_string_pretty(records)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
