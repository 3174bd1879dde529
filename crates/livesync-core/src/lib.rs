//! # Livesync Core
//!
//! Pure primitives for livesync: records, payload normalization, and
//! reconciliation.
//!
//! This crate contains no I/O, no tasks, no transports. It is pure
//! computation over JSON payloads.
//!
//! ## Key Types
//!
//! - [`Record`] - An ordered field map with a configurable identity field
//! - [`Envelope`] - The closed set of recognized payload shapes
//! - [`Normalized`] - Canonical reconciler input (`records` or `delta`)
//! - [`MergePolicy`] - How incoming lists are merged into a cache
//! - [`EntityConfig`] - Per-entity identity, shape, and merge settings
//!
//! ## Pipeline
//!
//! ```rust
//! use livesync_core::{normalize, reconcile, EntityConfig};
//! use serde_json::json;
//!
//! let config = EntityConfig::activities();
//! let payload = json!({ "data": { "createActivity": { "id": "5", "task": "Fix gutter" } } });
//!
//! let input = normalize(&payload, &config);
//! let next = reconcile(&[], input, &config);
//! assert_eq!(next.cache.len(), 1);
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod presets;
pub mod query;
pub mod reconcile;
pub mod record;

pub use config::EntityConfig;
pub use envelope::{
    classify, classify_text_aware, normalize, Delta, DeltaKind, Envelope, ListLocation,
    Normalized, Scope,
};
pub use error::{CoreError, Result};
pub use query::QuerySpec;
pub use reconcile::{reconcile, Applied, MergePolicy, Reconciled};
pub use record::{Identity, IdentityKeys, Record, DEFAULT_IDENTITY_KEYS};
