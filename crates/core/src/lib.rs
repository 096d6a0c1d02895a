//! Core traits and types for the i3X bridge.
//!
//! This crate defines the foundational abstractions used across the project:
//! the tagged value variant carried by every entity, the information-model
//! structs, the unified error type, and the configuration document.

pub mod config;
pub mod error;
pub mod model;
pub mod value;

pub use error::{Error, Result};
pub use model::{
    last_segment, parent_of, relationship_types, ElementId, Namespace, ObjectInstance, ObjectType,
    ObjectValue, Relationship, RelationshipType, DEFAULT_QUALITY, PLACEHOLDER_QUALITY,
    PLACEHOLDER_TYPE_ID,
};
pub use value::{format_timestamp_ms, now_rfc3339, to_rfc3339, Value};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::BridgeConfig;
    pub use crate::error::{Error, Result};
    pub use crate::model::{
        Namespace, ObjectInstance, ObjectType, ObjectValue, Relationship, RelationshipType,
    };
    pub use crate::value::Value;
}
