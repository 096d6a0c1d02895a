//! API handlers, grouped by resource.

pub mod admin;
pub mod basic;
pub mod namespaces;
pub mod object_types;
pub mod objects;
pub mod relationship_types;
pub mod subscriptions;
