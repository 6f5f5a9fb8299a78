//! Device types held by the hierarchy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a device, assigned by the caller on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A string did not name any variant of one of the device enums
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {what} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Kind of network element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Computer,
    Router,
    Hub,
    Switch,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 4] = [Self::Computer, Self::Router, Self::Hub, Self::Switch];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Computer => "computer",
            Self::Router => "router",
            Self::Hub => "hub",
            Self::Switch => "switch",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ParseEnumError;

    /// Matching ignores ASCII case, so "Router" and "router" are the same kind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                what: "device type",
                value: s.to_string(),
                expected: "computer, router, hub, switch",
            })
    }
}

/// Administrative status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Active, Self::Inactive]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                what: "status",
                value: s.to_string(),
                expected: "active, inactive",
            })
    }
}

/// A device record as stored, listed and persisted.
///
/// Children are not part of the record; they are derived from the parent
/// links of other devices (see [`crate::DeviceTree`] for the nested form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Primary key, immutable once created
    pub id: DeviceId,
    /// Kind of network element
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Human-readable name, never blank
    pub name: String,
    /// Parent device; `None` only for the root
    pub parent_id: Option<DeviceId>,
    /// Current status
    pub status: DeviceStatus,
}

impl Device {
    /// Create an active device with no parent
    pub fn new(id: i64, kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId(id),
            kind,
            name: name.into(),
            parent_id: None,
            status: DeviceStatus::default(),
        }
    }

    /// Attach this device under `parent`
    pub fn with_parent(mut self, parent: i64) -> Self {
        self.parent_id = Some(DeviceId(parent));
        self
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
