//! Canonical in-memory object store for the i3X bridge.
//!
//! The store owns every instance, value, and relationship in the graph.
//! External code holds immutable snapshots only; all mutation goes through
//! the store so derived state (parent links, reverse indices) can never
//! drift from the data it is derived from.

mod store;

pub use store::{ChangeListener, ListenerId, ObjectStore, StoreStats};
