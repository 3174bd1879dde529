//! # Livesync
//!
//! Live record synchronization channels: keep a local list of records in
//! sync with a backend that pushes changes.
//!
//! ## Overview
//!
//! A [`Channel`] owns one cached record list. Opening it:
//!
//! - **Fetches** a snapshot through the [`Backend`](transport::Backend)
//! - **Subscribes** through the first available live transport
//! - **Normalizes** every pushed payload into records or a delta
//! - **Reconciles** that input into the cache per the entity's merge policy
//! - **Fans out** the reconciled cache to every consumer, in order
//!
//! Without a usable transport the channel serves the snapshot only
//! (fetch-once mode).
//!
//! ## Key Concepts
//!
//! - **Envelope**: The shape a backend wraps records in. Recognized
//!   envelopes are listed in [`core::envelope`].
//! - **Identity**: The first non-empty of `id`, `ID`, `unique_id`,
//!   `Unique_ID` (configurable per entity).
//! - **Merge policy**: Replace the cache, upsert by identity, or upsert
//!   while keeping protected fields such as a local `read` flag.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use livesync::{Channel, ChannelConfig, Records};
//! use livesync::core::EntityConfig;
//! use livesync::transport::{MemoryHub, TransportSelector};
//!
//! async fn example() {
//!     let hub = MemoryHub::new();
//!     let selector = TransportSelector::negotiate(
//!         Some(Arc::new(hub.transport("websocket"))),
//!         Some(Arc::new(hub.transport("polling"))),
//!     );
//!
//!     let config = ChannelConfig::for_entity(EntityConfig::jobs());
//!     let channel = Channel::new(config, hub.clone(), selector).unwrap();
//!
//!     channel
//!         .on_update(|records: &Records| -> anyhow::Result<()> {
//!             println!("{} jobs", records.len());
//!             Ok(())
//!         })
//!         .unwrap();
//!
//!     let report = channel.open().await.unwrap();
//!     println!("opened with {} records via {:?}", report.records, report.transport);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `livesync::core` - Records, normalization, reconciliation
//! - `livesync::transport` - Backend, transports, selection

pub mod channel;
pub mod context;
pub mod dispatch;
pub mod error;

// Re-export component crates
pub use livesync_core as core;
pub use livesync_transport as transport;

// Re-export main types for convenience
pub use channel::{Channel, ChannelConfig, OpenReport};
pub use context::SyncContext;
pub use dispatch::{Consumer, ConsumerId, DispatchReport, Records};
pub use error::{LiveSyncError, Result};

pub use livesync_core::{EntityConfig, MergePolicy, QuerySpec, Record};
pub use livesync_transport::TransportKind;
