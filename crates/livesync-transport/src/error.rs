//! Error types for the transport module.

use thiserror::Error;

/// Errors raised by live transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Neither the primary nor the secondary transport could be opened.
    #[error("no live transport for {query}: {reason}")]
    Unavailable { query: String, reason: String },

    /// One transport raised while opening.
    #[error("transport {transport} failed to open: {reason}")]
    OpenFailed { transport: String, reason: String },

    /// The live source raised after it was opened.
    #[error("stream error: {0}")]
    Stream(String),

    /// The source was cancelled.
    #[error("source cancelled")]
    Cancelled,
}

/// Errors raised by the snapshot backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend rejected or failed the query.
    #[error("query {query} failed: {reason}")]
    Query { query: String, reason: String },

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
