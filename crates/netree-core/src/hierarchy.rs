//! Hierarchy API: the operation surface used by the transport layer
//!
//! Requests arrive as loosely typed payloads ([`NewDevice`], [`DeviceUpdate`])
//! and are validated here before they reach the [`DeviceStore`]. The store
//! sits behind a read/write lock: reads share it, and each write holds it
//! exclusively for the whole check-and-mutate step, so two concurrent
//! reparents can never both pass their cycle check against stale state.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

use crate::device::{Device, DeviceId, DeviceKind, DeviceStatus};
use crate::search;
use crate::store::{DeletePolicy, DeviceChanges, DeviceStore, StoreError};
use crate::traversal::{self, TraversalMethod};
use crate::tree::DeviceTree;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl HierarchyError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::Store(StoreError::DuplicateId(_)) => ErrorKind::DuplicateId,
            Self::Store(StoreError::UnknownParent(_)) => ErrorKind::UnknownParent,
            Self::Store(StoreError::MultipleRoots { .. }) => ErrorKind::MultipleRoots,
            Self::Store(StoreError::CycleDetected { .. }) => ErrorKind::CycleDetected,
            Self::Store(StoreError::RootDeletionForbidden(_)) => ErrorKind::RootDeletionForbidden,
            Self::Store(StoreError::DepthExceeded { .. }) => ErrorKind::DepthExceeded,
            Self::InvalidField { .. } => ErrorKind::InvalidField,
        }
    }
}

/// Failure kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateId,
    UnknownParent,
    MultipleRoots,
    CycleDetected,
    RootDeletionForbidden,
    DepthExceeded,
    InvalidField,
}

/// Create request. Every field is optional here so that missing ones are
/// reported as [`ErrorKind::InvalidField`] instead of a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDevice {
    pub id: Option<DeviceId>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub parent_id: Option<DeviceId>,
    pub status: Option<String>,
}

impl NewDevice {
    pub fn validate(self) -> Result<Device, HierarchyError> {
        let id = self.id.ok_or_else(|| HierarchyError::invalid("id", "missing"))?;
        let kind = parse_kind(self.kind.as_deref().ok_or_else(|| HierarchyError::invalid("type", "missing"))?)?;
        let name = check_name(self.name.ok_or_else(|| HierarchyError::invalid("name", "missing"))?)?;
        let status = parse_status(self.status.as_deref().ok_or_else(|| HierarchyError::invalid("status", "missing"))?)?;

        Ok(Device {
            id,
            kind,
            name,
            parent_id: self.parent_id,
            status,
        })
    }
}

/// Partial update request. Absent (or null) fields are left unchanged,
/// which means an update can never turn a device into a root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceUpdate {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub parent_id: Option<DeviceId>,
    pub status: Option<String>,
}

impl DeviceUpdate {
    pub fn validate(self) -> Result<DeviceChanges, HierarchyError> {
        Ok(DeviceChanges {
            kind: self.kind.as_deref().map(parse_kind).transpose()?,
            name: self.name.map(check_name).transpose()?,
            parent_id: self.parent_id,
            status: self.status.as_deref().map(parse_status).transpose()?,
        })
    }
}

fn parse_kind(raw: &str) -> Result<DeviceKind, HierarchyError> {
    raw.parse().map_err(|e| HierarchyError::invalid("type", format!("{e}")))
}

fn parse_status(raw: &str) -> Result<DeviceStatus, HierarchyError> {
    raw.parse().map_err(|e| HierarchyError::invalid("status", format!("{e}")))
}

fn check_name(name: String) -> Result<String, HierarchyError> {
    if name.trim().is_empty() {
        return Err(HierarchyError::invalid("name", "must not be empty"));
    }
    Ok(name)
}

/// Shared handle to the device tree
#[derive(Debug, Default)]
pub struct Hierarchy {
    store: RwLock<DeviceStore>,
    delete_policy: DeletePolicy,
}

impl Hierarchy {
    /// Create an empty hierarchy
    pub fn new(delete_policy: DeletePolicy) -> Self {
        Self::from_store(DeviceStore::new(), delete_policy)
    }

    /// Wrap an existing store, e.g. one rebuilt from a snapshot file
    pub fn from_store(store: DeviceStore, delete_policy: DeletePolicy) -> Self {
        Self {
            store: RwLock::new(store),
            delete_policy,
        }
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    // Store mutations validate before writing, so a poisoned lock still
    // guards a well-formed tree.
    fn read(&self) -> RwLockReadGuard<'_, DeviceStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeviceStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Full tree rooted at the root device
    pub fn list_tree(&self) -> Option<DeviceTree> {
        self.read().snapshot()
    }

    /// Every device, flat, in ascending ID order
    pub fn list_devices(&self) -> Vec<Device> {
        self.read().devices().cloned().collect()
    }

    pub fn get_device(&self, id: DeviceId) -> Result<Device, HierarchyError> {
        Ok(self.read().get(id)?.clone())
    }

    pub fn create_device(&self, request: NewDevice) -> Result<(), HierarchyError> {
        let device = request.validate()?;
        let id = device.id;
        self.write().add(device)?;
        debug!(device = %id, "Device created");
        Ok(())
    }

    pub fn update_device(&self, id: DeviceId, request: DeviceUpdate) -> Result<(), HierarchyError> {
        let changes = request.validate()?;
        let empty = changes.is_empty();
        self.write().update(id, changes)?;
        debug!(device = %id, empty, "Device updated");
        Ok(())
    }

    /// Delete a device using the configured [`DeletePolicy`]
    pub fn delete_device(&self, id: DeviceId) -> Result<Vec<DeviceId>, HierarchyError> {
        let removed = self.write().delete(id, self.delete_policy)?;
        debug!(device = %id, removed = removed.len(), "Device deleted");
        Ok(removed)
    }

    /// Flat devices in the given order, taken from one consistent state
    pub fn traverse(&self, method: TraversalMethod) -> Vec<Device> {
        traversal::traverse(&self.read(), method)
    }

    /// Like [`Hierarchy::traverse`], with the method given by name
    pub fn traverse_named(&self, method: &str) -> Result<Vec<Device>, HierarchyError> {
        let method = method
            .parse::<TraversalMethod>()
            .map_err(|e| HierarchyError::invalid("method", format!("{e}")))?;
        Ok(self.traverse(method))
    }

    pub fn search(&self, query: &str) -> Vec<Device> {
        search::search(&self.read(), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Barrier};

    fn new_device(id: i64, kind: &str, name: &str, parent_id: Option<i64>) -> NewDevice {
        NewDevice {
            id: Some(DeviceId(id)),
            kind: Some(kind.to_string()),
            name: Some(name.to_string()),
            parent_id: parent_id.map(DeviceId),
            status: Some("active".to_string()),
        }
    }

    fn example() -> Hierarchy {
        let hierarchy = Hierarchy::new(DeletePolicy::Reparent);
        hierarchy.create_device(new_device(1, "router", "Root", None)).unwrap();
        hierarchy.create_device(new_device(2, "computer", "Alpha", Some(1))).unwrap();
        hierarchy.create_device(new_device(3, "switch", "beta-1", Some(1))).unwrap();
        hierarchy
    }

    fn ids(devices: &[Device]) -> Vec<i64> {
        devices.iter().map(|d| d.id.get()).collect()
    }

    #[test]
    fn test_example_tree() {
        let hierarchy = example();
        assert_eq!(ids(&hierarchy.traverse(TraversalMethod::Dfs)), vec![1, 2, 3]);
        assert_eq!(ids(&hierarchy.traverse(TraversalMethod::Bfs)), vec![1, 2, 3]);
        assert_eq!(ids(&hierarchy.search("a")), vec![2, 3]);

        let err = hierarchy.delete_device(DeviceId(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RootDeletionForbidden);
    }

    #[test]
    fn test_create_reports_missing_fields() {
        let hierarchy = Hierarchy::default();
        for (field, request) in [
            ("id", NewDevice { id: None, ..new_device(1, "hub", "x", None) }),
            ("type", NewDevice { kind: None, ..new_device(1, "hub", "x", None) }),
            ("name", NewDevice { name: None, ..new_device(1, "hub", "x", None) }),
            ("status", NewDevice { status: None, ..new_device(1, "hub", "x", None) }),
        ] {
            let err = hierarchy.create_device(request).unwrap_err();
            assert_eq!(err, HierarchyError::invalid(field, "missing"));
        }
        assert!(hierarchy.is_empty());
    }

    #[test]
    fn test_create_rejects_bad_values() {
        let hierarchy = Hierarchy::default();

        let err = hierarchy.create_device(new_device(1, "modem", "x", None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);

        let err = hierarchy.create_device(new_device(1, "hub", "   ", None)).unwrap_err();
        assert_eq!(err, HierarchyError::invalid("name", "must not be empty"));

        let mut request = new_device(1, "hub", "x", None);
        request.status = Some("broken".to_string());
        let err = hierarchy.create_device(request).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidField { ref field, .. } if field == "status"));
    }

    #[test]
    fn test_create_maps_store_errors() {
        let hierarchy = example();
        let cases = [
            (new_device(2, "hub", "dup", Some(1)), ErrorKind::DuplicateId),
            (new_device(9, "hub", "lost", Some(40)), ErrorKind::UnknownParent),
            (new_device(9, "router", "second", None), ErrorKind::MultipleRoots),
        ];
        for (request, kind) in cases {
            assert_eq!(hierarchy.create_device(request).unwrap_err().kind(), kind);
        }
        assert_eq!(hierarchy.len(), 3);
    }

    #[test]
    fn test_get_device() {
        let hierarchy = example();
        assert_eq!(hierarchy.get_device(DeviceId(2)).unwrap().name, "Alpha");
        assert_eq!(hierarchy.get_device(DeviceId(5)).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let hierarchy = example();
        let before = hierarchy.list_tree();

        let update = DeviceUpdate {
            name: Some("renamed".to_string()),
            status: Some("sleeping".to_string()),
            ..Default::default()
        };
        assert_eq!(hierarchy.update_device(DeviceId(2), update).unwrap_err().kind(), ErrorKind::InvalidField);

        let update = DeviceUpdate {
            name: Some("renamed".to_string()),
            parent_id: Some(DeviceId(2)),
            ..Default::default()
        };
        assert_eq!(hierarchy.update_device(DeviceId(1), update).unwrap_err().kind(), ErrorKind::CycleDetected);

        assert_eq!(hierarchy.list_tree(), before);
    }

    #[test]
    fn test_update_fields_and_parent() {
        let hierarchy = example();
        let update = DeviceUpdate {
            kind: Some("Hub".to_string()),
            status: Some("inactive".to_string()),
            parent_id: Some(DeviceId(3)),
            ..Default::default()
        };
        hierarchy.update_device(DeviceId(2), update).unwrap();

        let device = hierarchy.get_device(DeviceId(2)).unwrap();
        assert_eq!(device.kind, DeviceKind::Hub);
        assert_eq!(device.status, DeviceStatus::Inactive);
        assert_eq!(device.parent_id, Some(DeviceId(3)));
        assert_eq!(ids(&hierarchy.traverse(TraversalMethod::Dfs)), vec![1, 3, 2]);
    }

    #[test]
    fn test_update_with_blank_name() {
        let hierarchy = example();
        let update = DeviceUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(hierarchy.update_device(DeviceId(2), update).unwrap_err().kind(), ErrorKind::InvalidField);
    }

    #[test]
    fn test_delete_uses_configured_policy() {
        let build = |policy| {
            let hierarchy = Hierarchy::new(policy);
            hierarchy.create_device(new_device(1, "router", "core", None)).unwrap();
            hierarchy.create_device(new_device(2, "switch", "sw", Some(1))).unwrap();
            hierarchy.create_device(new_device(3, "computer", "pc", Some(2))).unwrap();
            hierarchy
        };

        let reparent = build(DeletePolicy::Reparent);
        assert_eq!(reparent.delete_device(DeviceId(2)).unwrap(), vec![DeviceId(2)]);
        assert_eq!(reparent.get_device(DeviceId(3)).unwrap().parent_id, Some(DeviceId(1)));

        let cascade = build(DeletePolicy::Cascade);
        assert_eq!(cascade.delete_device(DeviceId(2)).unwrap(), vec![DeviceId(2), DeviceId(3)]);
        assert_eq!(cascade.len(), 1);
    }

    #[test]
    fn test_traverse_named() {
        let hierarchy = example();
        assert_eq!(ids(&hierarchy.traverse_named("BFS").unwrap()), vec![1, 2, 3]);
        let err = hierarchy.traverse_named("postorder").unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidField { ref field, .. } if field == "method"));
    }

    #[test]
    fn test_list_devices_by_id() {
        let hierarchy = Hierarchy::default();
        hierarchy.create_device(new_device(5, "router", "core", None)).unwrap();
        hierarchy.create_device(new_device(9, "hub", "a", Some(5))).unwrap();
        hierarchy.create_device(new_device(2, "hub", "b", Some(5))).unwrap();
        assert_eq!(ids(&hierarchy.list_devices()), vec![2, 5, 9]);
    }

    #[test]
    fn test_request_decoding() {
        let request: NewDevice =
            serde_json::from_str(r#"{"id": 4, "type": "hub", "name": "lab", "parent_id": null, "status": "active"}"#)
                .unwrap();
        let device = request.validate().unwrap();
        assert_eq!(device, Device::new(4, DeviceKind::Hub, "lab"));

        let update: DeviceUpdate = serde_json::from_str(r#"{"name": "lab-2"}"#).unwrap();
        let changes = update.validate().unwrap();
        assert_eq!(changes.name.as_deref(), Some("lab-2"));
        assert!(changes.parent_id.is_none());
    }

    /// Two siblings swapped under each other at the same time: one move must
    /// win and the other must see the result and fail.
    #[test]
    fn test_concurrent_cross_reparent_never_cycles() {
        for _ in 0..200 {
            let hierarchy = Arc::new(example());
            let barrier = Arc::new(Barrier::new(2));

            let results: Vec<_> = [(2, 3), (3, 2)]
                .into_iter()
                .map(|(id, parent)| {
                    let hierarchy = Arc::clone(&hierarchy);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        let update = DeviceUpdate {
                            parent_id: Some(DeviceId(parent)),
                            ..Default::default()
                        };
                        hierarchy.update_device(DeviceId(id), update)
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect();

            let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].kind(), ErrorKind::CycleDetected);
            hierarchy.read().assert_invariants();
        }
    }

    #[test]
    fn test_readers_see_complete_trees_during_writes() {
        let hierarchy = Arc::new(example());
        for n in 10..60 {
            hierarchy.create_device(new_device(n, "computer", "pc", Some(2))).unwrap();
        }

        std::thread::scope(|scope| {
            let writer = Arc::clone(&hierarchy);
            scope.spawn(move || {
                for n in 10..60 {
                    let parent = if n % 2 == 0 { 3 } else { 2 };
                    let update = DeviceUpdate {
                        parent_id: Some(DeviceId(parent)),
                        ..Default::default()
                    };
                    writer.update_device(DeviceId(n), update).unwrap();
                }
            });

            for _ in 0..4 {
                let reader = Arc::clone(&hierarchy);
                scope.spawn(move || {
                    for _ in 0..50 {
                        let order = reader.traverse(TraversalMethod::Bfs);
                        let unique: BTreeSet<_> = order.iter().map(|d| d.id).collect();
                        assert_eq!(order.len(), 53);
                        assert_eq!(unique.len(), 53);
                    }
                });
            }
        });
    }
}
