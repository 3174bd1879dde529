//! # Livesync Transport
//!
//! Upstream interfaces for livesync: the snapshot [`Backend`], live
//! [`Transport`]s, and the [`TransportSelector`] that picks one.
//!
//! ## Overview
//!
//! A channel fetches one snapshot from the backend, then asks the selector
//! for a live [`EventSource`]. The selector tries the primary transport and
//! falls back to the secondary one; if neither opens, the channel stays in
//! fetch-once mode.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use livesync_core::QuerySpec;
//! use livesync_transport::{MemoryHub, SourceEvent, TransportSelector};
//!
//! async fn example() {
//!     let hub = MemoryHub::new();
//!     let selector = TransportSelector::negotiate(
//!         Some(Arc::new(hub.transport("websocket"))),
//!         Some(Arc::new(hub.transport("polling"))),
//!     );
//!
//!     let mut selected = selector.open(&QuerySpec::new("subscribeToCalcJobs")).await.unwrap();
//!     while let Some(event) = selected.source.next().await {
//!         if let SourceEvent::Payload(payload) = event {
//!             println!("{payload}");
//!         }
//!     }
//! }
//! ```
//!
//! ## Failure Semantics
//!
//! - A transport that raises while opening is skipped in favor of the next.
//! - An error delivered after opening ends that source. There is no
//!   automatic reconnect.
//! - Cancelling a source is idempotent and safe after it has ended.

pub mod backend;
pub mod error;
pub mod memory;
pub mod selector;
pub mod source;
pub mod transport;

pub use backend::Backend;
pub use error::{BackendError, Result, TransportError};
pub use memory::{MemoryHub, MemoryTransport};
pub use selector::{Capabilities, Selected, TransportKind, TransportSelector};
pub use source::{EventSink, EventSource, SourceEvent, SourceHandle};
pub use transport::Transport;
