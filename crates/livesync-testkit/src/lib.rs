//! # Livesync Testkit
//!
//! Testing utilities for livesync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Payload vectors**: Known payloads with the records or delta every
//!   implementation must extract from them
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Payload builders and a memory hub with two transports
//! - **Recorder**: A consumer that records every delivered cache
//! - **Log capture**: A tracing layer for asserting on emitted warnings
//!
//! ## Payload Vectors
//!
//! ```rust
//! use livesync_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{name}: {detail}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use livesync_testkit::generators::record_list;
//!
//! proptest! {
//!     #[test]
//!     fn replace_all_is_idempotent(list in record_list(16)) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use livesync_core::EntityConfig;
//! use livesync_testkit::fixtures::{activity, HubFixture};
//!
//! async fn example() {
//!     let fixture = HubFixture::new();
//!     fixture.snapshot(&EntityConfig::activities(), [activity("1", "Mow")]).await;
//!     let selector = fixture.selector();
//! }
//! ```

pub mod capture;
pub mod fixtures;
pub mod generators;
pub mod recorder;
pub mod vectors;

pub use capture::{CapturedEvent, LogCapture};
pub use fixtures::{init_tracing, HubFixture};
pub use recorder::{ids, recorder, Recorder};
pub use vectors::{all_vectors, check_vector, verify_all_vectors, PayloadVector};
