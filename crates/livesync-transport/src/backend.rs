//! Snapshot backend abstraction.

use async_trait::async_trait;
use livesync_core::QuerySpec;
use serde_json::Value;

use crate::error::BackendError;

/// The backend a channel fetches its initial snapshot from.
///
/// The returned payload may use any envelope shape the normalizer accepts.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run the query once and return the raw payload.
    async fn fetch(&self, query: &QuerySpec) -> Result<Value, BackendError>;
}
