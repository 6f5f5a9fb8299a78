//! Depth-first and breadth-first orderings over the device store
//!
//! Both orders start at the root and visit siblings in their stored
//! insertion order, so the output is fully determined by the store state.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::device::{Device, DeviceId, ParseEnumError};
use crate::store::DeviceStore;

/// Traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalMethod {
    /// Pre-order depth-first: a device, then each child subtree in turn
    Dfs,
    /// Level order: all devices at depth d before any at depth d + 1
    Bfs,
}

impl TraversalMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dfs => "dfs",
            Self::Bfs => "bfs",
        }
    }
}

impl fmt::Display for TraversalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TraversalMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Dfs, Self::Bfs]
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                what: "traversal method",
                value: s.to_string(),
                expected: "dfs, bfs",
            })
    }
}

/// Device IDs in pre-order, starting at the root
pub fn dfs_ids(store: &DeviceStore) -> Vec<DeviceId> {
    match store.root_id() {
        Some(root) => store.subtree(root),
        None => Vec::new(),
    }
}

/// Device IDs in level order, starting at the root
pub fn bfs_ids(store: &DeviceStore) -> Vec<DeviceId> {
    let mut order = Vec::with_capacity(store.len());
    let mut queue: VecDeque<DeviceId> = store.root_id().into_iter().collect();
    while let Some(id) = queue.pop_front() {
        order.push(id);
        queue.extend(store.children(id));
    }
    order
}

pub fn ids(store: &DeviceStore, method: TraversalMethod) -> Vec<DeviceId> {
    match method {
        TraversalMethod::Dfs => dfs_ids(store),
        TraversalMethod::Bfs => bfs_ids(store),
    }
}

/// Copies of every device in traversal order
pub fn traverse(store: &DeviceStore, method: TraversalMethod) -> Vec<Device> {
    ids(store, method)
        .into_iter()
        .filter_map(|id| store.get(id).ok())
        .cloned()
        .collect()
}
