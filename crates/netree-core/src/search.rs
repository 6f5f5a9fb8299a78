//! Device lookup by ID or name fragment

use crate::device::{Device, DeviceId};
use crate::store::DeviceStore;
use crate::traversal;

/// A parsed search query.
///
/// A device matches when its ID equals the query read as an integer, or
/// when its name contains the query ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    id: Option<DeviceId>,
    needle: String,
}

impl SearchQuery {
    /// Parse a raw query. Returns `None` for the empty query, which matches
    /// nothing.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        Some(Self {
            id: raw.parse::<i64>().ok().map(DeviceId),
            needle: raw.to_lowercase(),
        })
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.id == Some(device.id) || device.name.to_lowercase().contains(&self.needle)
    }
}

/// All matching devices in depth-first order
pub fn search(store: &DeviceStore, raw: &str) -> Vec<Device> {
    let Some(query) = SearchQuery::parse(raw) else {
        return Vec::new();
    };

    traversal::dfs_ids(store)
        .into_iter()
        .filter_map(|id| store.get(id).ok())
        .filter(|device| query.matches(device))
        .cloned()
        .collect()
}
