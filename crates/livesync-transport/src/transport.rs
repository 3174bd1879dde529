//! Transport abstraction for live updates.
//!
//! A transport turns a query into an [`EventSource`] of push payloads.
//! Implementations may sit on WebSockets, server-sent events, long polling,
//! or anything else; the channel never looks past this trait.

use async_trait::async_trait;
use livesync_core::QuerySpec;

use crate::error::Result;
use crate::source::EventSource;

/// A live-update mechanism.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this transport can be used at all in the current
    /// environment. Checked once, when transports are negotiated.
    fn is_available(&self) -> bool;

    /// Open a live subscription for a query.
    ///
    /// An error here means "this transport raised while opening"; the
    /// selector falls back to the next transport.
    async fn subscribe(&self, query: &QuerySpec) -> Result<EventSource>;
}
