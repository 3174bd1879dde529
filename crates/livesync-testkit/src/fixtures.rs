//! Test fixtures and helpers.
//!
//! Payload builders for every envelope shape the normalizer accepts, and a
//! hub fixture wiring a memory backend to primary and secondary transports.

use std::sync::{Arc, Once};

use livesync_core::{DeltaKind, EntityConfig, Record};
use livesync_transport::{MemoryHub, MemoryTransport, Transport, TransportSelector};
use serde_json::{json, Value};

/// Build a record from a JSON object. Panics on anything else.
pub fn record(value: Value) -> Record {
    match Record::from_value(value) {
        Some(record) => record,
        None => panic!("fixture record must be a JSON object"),
    }
}

/// Build records from JSON objects.
pub fn records(values: impl IntoIterator<Item = Value>) -> Vec<Record> {
    values.into_iter().map(record).collect()
}

/// An activity record with the fields the activities preset recognizes.
pub fn activity(id: &str, task: &str) -> Value {
    json!({ "id": id, "task": task, "activity_status": "To Be Started" })
}

/// An announcement record with an explicit `read` flag.
pub fn announcement(id: &str, title: &str, read: bool) -> Value {
    json!({ "id": id, "title": title, "content": "", "read": read })
}

/// `{ "records": [...] }`
pub fn records_payload(items: impl IntoIterator<Item = Value>) -> Value {
    json!({ "records": items.into_iter().collect::<Vec<_>>() })
}

/// `{ "data": { <field>: [...] } }`
pub fn subscription_payload(field: &str, items: impl IntoIterator<Item = Value>) -> Value {
    json!({ "data": { field: items.into_iter().collect::<Vec<_>>() } })
}

/// `{ "data": { <kind><Entity>: record } }`
pub fn mutation_payload(kind: DeltaKind, entity: &str, item: Value) -> Value {
    json!({ "data": { (kind.wrapper_key(entity)): item } })
}

/// Wrap any payload one level deeper under `payload`.
pub fn nested(payload: Value) -> Value {
    json!({ "payload": payload })
}

/// A payload no normalization step recognizes.
pub fn heartbeat() -> Value {
    json!({ "type": "ka" })
}

/// A memory hub with a primary and a secondary transport.
pub struct HubFixture {
    pub hub: Arc<MemoryHub>,
    pub primary: Arc<MemoryTransport>,
    pub secondary: Arc<MemoryTransport>,
}

impl HubFixture {
    /// Both transports available.
    pub fn new() -> Self {
        let hub = MemoryHub::new();
        Self {
            primary: Arc::new(hub.transport("websocket")),
            secondary: Arc::new(hub.transport("polling")),
            hub,
        }
    }

    /// Primary raises on subscribe; secondary is available.
    pub fn with_failing_primary() -> Self {
        let hub = MemoryHub::new();
        Self {
            primary: Arc::new(hub.transport("websocket").failing()),
            secondary: Arc::new(hub.transport("polling")),
            hub,
        }
    }

    /// Neither transport is available.
    pub fn without_transports() -> Self {
        let hub = MemoryHub::new();
        Self {
            primary: Arc::new(hub.transport("websocket").unavailable()),
            secondary: Arc::new(hub.transport("polling").unavailable()),
            hub,
        }
    }

    /// Selector over both transports.
    pub fn selector(&self) -> TransportSelector {
        let primary: Arc<dyn Transport> = self.primary.clone();
        let secondary: Arc<dyn Transport> = self.secondary.clone();
        TransportSelector::negotiate(Some(primary), Some(secondary))
    }

    /// Serve `items` as the snapshot for the entity's subscription query.
    pub async fn snapshot(&self, entity: &EntityConfig, items: impl IntoIterator<Item = Value>) {
        self.hub
            .set_snapshot(&query_name(entity), records_payload(items))
            .await;
    }
}

impl Default for HubFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Query name a channel derives for `entity`.
pub fn query_name(entity: &EntityConfig) -> String {
    entity
        .subscription_field
        .clone()
        .unwrap_or_else(|| entity.entity.clone())
}

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
