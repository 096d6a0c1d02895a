//! REST + SSE facade over the i3X bridge core.
//!
//! The core consumes none of this internally; every endpoint is a thin
//! adapter over the store, the pipeline, and the subscription manager.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;

pub use auth::AuthState;
pub use models::{ErrorResponse, ObjectInfo};
pub use server::{create_router, run, ServerState};
