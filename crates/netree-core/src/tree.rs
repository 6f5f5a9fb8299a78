//! Nested view of the device hierarchy for rendering

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::device::{Device, DeviceId};
use crate::store::DeviceStore;
use crate::traversal;

/// A device together with its children, recursively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTree {
    #[serde(flatten)]
    pub device: Device,
    /// Children in insertion order
    pub children: Vec<DeviceTree>,
}

impl DeviceTree {
    /// Build the tree rooted at the store's root, or `None` for an empty store
    pub fn from_store(store: &DeviceStore) -> Option<Self> {
        let root = store.root_id()?;
        let order = traversal::dfs_ids(store);

        // Children always follow their parent in pre-order, so walking it
        // backwards finishes every subtree before the node that owns it.
        let mut built: HashMap<DeviceId, DeviceTree> = HashMap::with_capacity(order.len());
        for id in order.into_iter().rev() {
            let Ok(device) = store.get(id) else { continue };
            let children = store
                .children(id)
                .iter()
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(
                id,
                DeviceTree {
                    device: device.clone(),
                    children,
                },
            );
        }

        built.remove(&root)
    }

    pub fn id(&self) -> DeviceId {
        self.device.id
    }

    /// Number of devices in this subtree, including this one
    pub fn count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl Drop for DeviceTree {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}
