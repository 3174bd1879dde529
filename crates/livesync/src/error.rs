//! Error types for channels.

use livesync_core::CoreError;
use livesync_transport::BackendError;
use thiserror::Error;

/// Errors returned to the caller of a channel operation.
///
/// Transport failures, normalization misses, and consumer failures are not
/// here: they are logged by the channel and never reach the opener.
#[derive(Debug, Error)]
pub enum LiveSyncError {
    /// The initial snapshot query failed. No transport was started.
    #[error("snapshot fetch failed for {query}: {source}")]
    SnapshotFetchFailed {
        query: String,
        #[source]
        source: BackendError,
    },

    /// The channel's task is no longer running.
    #[error("channel task has stopped")]
    ChannelClosed,

    /// Invalid entity configuration.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, LiveSyncError>;
