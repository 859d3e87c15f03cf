//! Ambient errors shared by every `aec-*` crate: configuration and
//! persistence failures. Component-specific failures (sandbox, consensus,
//! workflow, ...) get their own `thiserror` enum in their own crate instead
//! of sharing one error type.

use thiserror::Error;

/// Result type for core (config/persistence) operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
