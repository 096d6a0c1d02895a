//! Unified error handling for the i3X bridge.
//!
//! This module provides a common error type that can be used across all
//! crates, reducing boilerplate and making error handling consistent.

/// Unified error type for the bridge.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// MQTT transport errors.
    #[error("MQTT error: {0}")]
    Mqtt(String),

    /// Object store errors.
    #[error("Store error: {0}")]
    Store(String),

    /// Ingest pipeline errors.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Subscription-related errors.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Validation errors.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict with existing state (duplicate id, type in use).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error for a named resource.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Unified result type for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
