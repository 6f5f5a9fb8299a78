//! netree Core - Device hierarchy engine
//!
//! This crate holds everything that knows about the shape of the device tree:
//! - Device records and their enumerations
//! - The device store with its parent → children index and invariants
//! - Depth-first / breadth-first traversal and name/ID search
//! - The hierarchy API that validates requests and guards the store
//! - JSON snapshot persistence

pub mod device;
pub mod hierarchy;
pub mod persist;
pub mod search;
pub mod store;
pub mod traversal;
pub mod tree;

pub use device::{Device, DeviceId, DeviceKind, DeviceStatus, ParseEnumError};
pub use hierarchy::{DeviceUpdate, ErrorKind, Hierarchy, HierarchyError, NewDevice};
pub use persist::PersistError;
pub use search::SearchQuery;
pub use store::{DeletePolicy, DeviceChanges, DeviceStore, StoreError, MAX_DEPTH};
pub use traversal::TraversalMethod;
pub use tree::DeviceTree;
