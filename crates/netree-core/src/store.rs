//! Device store: canonical device records plus the parent → children index
//!
//! The store owns every [`Device`] and keeps an explicit, ordered adjacency
//! index next to the record table. Both are updated together on every
//! mutation, and every mutation checks all of its preconditions before it
//! writes anything, so a failed call leaves the store untouched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::device::{Device, DeviceId, DeviceKind, DeviceStatus};
use crate::tree::DeviceTree;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("device {0} not found")]
    NotFound(DeviceId),
    #[error("device {0} already exists")]
    DuplicateId(DeviceId),
    #[error("parent device {0} does not exist")]
    UnknownParent(DeviceId),
    #[error("device {rejected} has no parent but device {existing} is already the root")]
    MultipleRoots { existing: DeviceId, rejected: DeviceId },
    #[error("moving device {id} under device {parent_id} would create a cycle")]
    CycleDetected { id: DeviceId, parent_id: DeviceId },
    #[error("root device {0} cannot be deleted")]
    RootDeletionForbidden(DeviceId),
    #[error("device {id} would sit below the {limit}-level depth limit")]
    DepthExceeded { id: DeviceId, limit: usize },
}

/// Maximum number of levels in the tree, counting the root as level 1.
///
/// Nested views are serialized one stack frame per level, so the limit keeps
/// a full-depth tree well inside a 2 MiB worker stack.
pub const MAX_DEPTH: usize = 512;

/// What happens to the children of a deleted device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Children move up to the deleted device's parent, taking its place
    /// in the sibling order
    #[default]
    Reparent,
    /// The whole subtree is removed with the device
    Cascade,
}

/// Partial update of a device. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceChanges {
    pub kind: Option<DeviceKind>,
    pub name: Option<String>,
    pub parent_id: Option<DeviceId>,
    pub status: Option<DeviceStatus>,
}

impl DeviceChanges {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.name.is_none() && self.parent_id.is_none() && self.status.is_none()
    }
}

/// The device tree, stored as a record table plus a child index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStore {
    /// All devices indexed by ID
    devices: BTreeMap<DeviceId, Device>,
    /// Children of each device in insertion order
    children: HashMap<DeviceId, Vec<DeviceId>>,
    /// The unique parentless device
    root: Option<DeviceId>,
}

impl DeviceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// ID of the root device, if the store is not empty
    pub fn root_id(&self) -> Option<DeviceId> {
        self.root
    }

    pub fn root(&self) -> Option<&Device> {
        self.root.and_then(|id| self.devices.get(&id))
    }

    /// Get a device by ID
    pub fn get(&self, id: DeviceId) -> Result<&Device, StoreError> {
        self.devices.get(&id).ok_or(StoreError::NotFound(id))
    }

    /// Children of `id` in insertion order (empty for leaves and unknown IDs)
    pub fn children(&self, id: DeviceId) -> &[DeviceId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All devices in ascending ID order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Nested copy of the whole tree, or `None` when the store is empty
    pub fn snapshot(&self) -> Option<DeviceTree> {
        DeviceTree::from_store(self)
    }

    /// Insert a new device and append it to its parent's children
    pub fn add(&mut self, device: Device) -> Result<(), StoreError> {
        if self.contains(device.id) {
            return Err(StoreError::DuplicateId(device.id));
        }

        match device.parent_id {
            None => {
                if let Some(existing) = self.root {
                    return Err(StoreError::MultipleRoots {
                        existing,
                        rejected: device.id,
                    });
                }
                self.root = Some(device.id);
            }
            Some(parent_id) => {
                if !self.contains(parent_id) {
                    return Err(StoreError::UnknownParent(parent_id));
                }
                if self.depth(parent_id) >= MAX_DEPTH {
                    return Err(StoreError::DepthExceeded {
                        id: device.id,
                        limit: MAX_DEPTH,
                    });
                }
                self.children.entry(parent_id).or_default().push(device.id);
            }
        }

        debug!(device = %device.id, parent = ?device.parent_id, "Added device");
        self.devices.insert(device.id, device);
        Ok(())
    }

    /// Apply a partial update.
    ///
    /// A changed `parent_id` moves the device (with its subtree) to the end
    /// of the new parent's children. Setting the current parent again is a
    /// no-op and keeps the sibling order.
    pub fn update(&mut self, id: DeviceId, changes: DeviceChanges) -> Result<(), StoreError> {
        let current_parent = self.get(id)?.parent_id;

        let new_parent = match changes.parent_id {
            Some(parent_id) if Some(parent_id) != current_parent => {
                self.check_reparent(id, parent_id)?;
                Some(parent_id)
            }
            _ => None,
        };

        let device = self.devices.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(kind) = changes.kind {
            device.kind = kind;
        }
        if let Some(name) = changes.name {
            device.name = name;
        }
        if let Some(status) = changes.status {
            device.status = status;
        }

        if let Some(parent_id) = new_parent {
            self.relink(id, current_parent, parent_id);
            debug!(device = %id, parent = %parent_id, "Reparented device");
        }

        Ok(())
    }

    /// Remove a device, resolving its children per `policy`.
    ///
    /// Returns the IDs that were removed: the device alone under
    /// [`DeletePolicy::Reparent`], the whole subtree in pre-order under
    /// [`DeletePolicy::Cascade`].
    pub fn delete(&mut self, id: DeviceId, policy: DeletePolicy) -> Result<Vec<DeviceId>, StoreError> {
        let device = self.get(id)?;
        let parent_id = match device.parent_id {
            Some(parent_id) => parent_id,
            None => return Err(StoreError::RootDeletionForbidden(id)),
        };

        let removed = match policy {
            DeletePolicy::Reparent => {
                let orphans = self.children.remove(&id).unwrap_or_default();
                for orphan in &orphans {
                    if let Some(child) = self.devices.get_mut(orphan) {
                        child.parent_id = Some(parent_id);
                    }
                }

                let siblings = self.children.entry(parent_id).or_default();
                match siblings.iter().position(|c| *c == id) {
                    Some(pos) => {
                        siblings.splice(pos..=pos, orphans);
                    }
                    None => siblings.extend(orphans),
                }
                if siblings.is_empty() {
                    self.children.remove(&parent_id);
                }

                self.devices.remove(&id);
                vec![id]
            }
            DeletePolicy::Cascade => {
                let subtree = self.subtree(id);
                for removed in &subtree {
                    self.devices.remove(removed);
                    self.children.remove(removed);
                }
                self.detach(parent_id, id);
                subtree
            }
        };

        debug!(device = %id, ?policy, removed = removed.len(), "Deleted device");
        Ok(removed)
    }

    /// True if `ancestor` lies on the parent chain of `id` (or is `id`).
    ///
    /// The walk carries a visited set, so it terminates and answers `true`
    /// even if the parent links were somehow corrupted into a loop.
    pub fn is_ancestor_or_self(&self, ancestor: DeviceId, id: DeviceId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            if cursor == ancestor || !visited.insert(cursor) {
                return true;
            }
            current = self.devices.get(&cursor).and_then(|d| d.parent_id);
        }
        false
    }

    /// Pre-order IDs of the subtree rooted at `start`
    pub fn subtree(&self, start: DeviceId) -> Vec<DeviceId> {
        if !self.contains(start) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Level of `id` in the tree: 1 for the root, 0 for unknown IDs
    pub fn depth(&self, id: DeviceId) -> usize {
        let mut depth = 0;
        let mut current = self.devices.get(&id);
        while let Some(device) = current {
            depth += 1;
            if depth > self.devices.len() {
                break;
            }
            current = device.parent_id.and_then(|p| self.devices.get(&p));
        }
        depth
    }

    /// Number of levels in the subtree rooted at `id` (1 for a leaf)
    pub fn height(&self, id: DeviceId) -> usize {
        if !self.contains(id) {
            return 0;
        }

        let mut height = 0;
        let mut level = vec![id];
        while !level.is_empty() {
            height += 1;
            level = level.iter().flat_map(|c| self.children(*c)).copied().collect();
        }
        height
    }

    fn check_reparent(&self, id: DeviceId, parent_id: DeviceId) -> Result<(), StoreError> {
        if !self.contains(parent_id) {
            return Err(StoreError::UnknownParent(parent_id));
        }
        if self.is_ancestor_or_self(id, parent_id) {
            return Err(StoreError::CycleDetected { id, parent_id });
        }
        if self.depth(parent_id) + self.height(id) > MAX_DEPTH {
            return Err(StoreError::DepthExceeded { id, limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn relink(&mut self, id: DeviceId, old_parent: Option<DeviceId>, new_parent: DeviceId) {
        if let Some(old_parent) = old_parent {
            self.detach(old_parent, id);
        }
        self.children.entry(new_parent).or_default().push(id);
        if let Some(device) = self.devices.get_mut(&id) {
            device.parent_id = Some(new_parent);
        }
    }

    fn detach(&mut self, parent_id: DeviceId, id: DeviceId) {
        if let Some(siblings) = self.children.get_mut(&parent_id) {
            siblings.retain(|c| *c != id);
            if siblings.is_empty() {
                self.children.remove(&parent_id);
            }
        }
    }

    /// Panic unless every structural invariant holds
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        if self.devices.is_empty() {
            assert!(self.root.is_none(), "empty store must have no root");
            assert!(self.children.is_empty(), "empty store must have no child index");
            return;
        }

        let roots: Vec<_> = self.devices.values().filter(|d| d.is_root()).map(|d| d.id).collect();
        assert_eq!(roots.len(), 1, "exactly one root expected, found {:?}", roots);
        assert_eq!(self.root, Some(roots[0]));

        for device in self.devices.values() {
            if let Some(parent_id) = device.parent_id {
                assert!(self.contains(parent_id), "device {} has dangling parent", device.id);
                let listed = self.children(parent_id).iter().filter(|c| **c == device.id).count();
                assert_eq!(listed, 1, "device {} must appear once under its parent", device.id);
            }
        }

        for (parent_id, kids) in &self.children {
            assert!(self.contains(*parent_id), "child index holds removed device {}", parent_id);
            assert!(!kids.is_empty(), "child index keeps an empty list for {}", parent_id);
            for kid in kids {
                assert_eq!(self.devices.get(kid).and_then(|d| d.parent_id), Some(*parent_id));
            }
        }

        let reachable = self.subtree(roots[0]);
        let unique: HashSet<_> = reachable.iter().copied().collect();
        assert_eq!(unique.len(), reachable.len(), "a device was reached twice");
        assert_eq!(reachable.len(), self.devices.len(), "a device is unreachable from the root");
    }
}
