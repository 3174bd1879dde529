//! Error types for livesync core.

use thiserror::Error;

/// Errors raised while building core configuration.
///
/// Normalization and reconciliation never fail: an unrecognized payload is
/// a no-op, not an error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("identity key list is empty for entity {0}")]
    EmptyIdentityKeys(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
