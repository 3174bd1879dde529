//! Payload vectors for cross-implementation verification.
//!
//! Each vector pairs a backend payload with the records or delta every
//! implementation must extract from it under the activities preset.

use livesync_core::{normalize, DeltaKind, EntityConfig, Normalized};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single payload vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadVector {
    pub name: String,
    pub description: String,
    pub payload: Value,
    /// Expected `records`, empty when a delta or a miss is expected.
    pub records: Vec<Value>,
    /// Expected delta as `(kind, record)`.
    pub delta: Option<(String, Value)>,
}

fn vector(name: &str, description: &str, payload: Value, records: Vec<Value>) -> PayloadVector {
    PayloadVector {
        name: name.into(),
        description: description.into(),
        payload,
        records,
        delta: None,
    }
}

fn delta_vector(name: &str, description: &str, payload: Value, kind: &str, record: Value) -> PayloadVector {
    PayloadVector {
        name: name.into(),
        description: description.into(),
        payload,
        records: Vec::new(),
        delta: Some((kind.into(), record)),
    }
}

/// All payload vectors.
pub fn all_vectors() -> Vec<PayloadVector> {
    let gutter = json!({ "id": "2", "task": "Fix gutter" });

    vec![
        vector(
            "records_array",
            "records holding an array",
            json!({ "records": [{ "id": "1" }, { "id": "2" }] }),
            vec![json!({ "id": "1" }), json!({ "id": "2" })],
        ),
        vector(
            "records_object",
            "records holding one object is wrapped",
            json!({ "records": { "id": "1" } }),
            vec![json!({ "id": "1" })],
        ),
        vector(
            "resp_array",
            "resp holding an array",
            json!({ "resp": [{ "ID": 7 }] }),
            vec![json!({ "ID": 7 })],
        ),
        vector(
            "subscription_field",
            "data keyed by the subscription field",
            json!({ "data": { "subscribeToCalcActivities": [gutter.clone()] } }),
            vec![gutter.clone()],
        ),
        vector(
            "payload_prefixed",
            "subscription list one level under payload",
            json!({ "payload": { "data": { "subscribeToCalcActivities": [gutter.clone()] } } }),
            vec![gutter.clone()],
        ),
        vector(
            "bare_record",
            "object with an identity and a domain field",
            gutter.clone(),
            vec![gutter.clone()],
        ),
        vector(
            "deep_search",
            "entity-shaped array at an unknown path",
            json!({ "result": { "items": { "list": [gutter.clone()] } } }),
            vec![gutter.clone()],
        ),
        vector(
            "bare_array",
            "top-level array of objects",
            json!([{ "unique_id": "u1" }]),
            vec![json!({ "unique_id": "u1" })],
        ),
        vector(
            "json_text",
            "payload delivered as JSON text",
            Value::String(r#"{"records":[{"id":"9"}]}"#.into()),
            vec![json!({ "id": "9" })],
        ),
        delta_vector(
            "create_mutation",
            "createActivity result",
            json!({ "data": { "createActivity": { "id": "5", "task": "Fix gutter" } } }),
            "create",
            json!({ "id": "5", "task": "Fix gutter" }),
        ),
        delta_vector(
            "update_mutation_prefixed",
            "updateActivity result under payload",
            json!({ "payload": { "data": { "updateActivity": { "id": "5" } } } }),
            "update",
            json!({ "id": "5" }),
        ),
        vector("heartbeat", "keepalive is a miss", json!({ "type": "ka" }), vec![]),
        vector(
            "empty_records",
            "empty list with nothing else is a miss",
            json!({ "records": [] }),
            vec![],
        ),
    ]
}

fn kind_name(kind: DeltaKind) -> &'static str {
    match kind {
        DeltaKind::Create => "create",
        DeltaKind::Update => "update",
        DeltaKind::Delete => "delete",
    }
}

/// Check one vector. Returns a description of the mismatch, if any.
pub fn check_vector(vector: &PayloadVector) -> Result<(), String> {
    let config = EntityConfig::activities();
    let Normalized { records, delta } = normalize(&vector.payload, &config);

    let records: Vec<Value> = records.into_iter().map(|r| r.into_value()).collect();
    if records != vector.records {
        return Err(format!("records: expected {:?}, got {:?}", vector.records, records));
    }

    let delta = delta.map(|d| (kind_name(d.kind).to_string(), d.record.into_value()));
    if delta != vector.delta {
        return Err(format!("delta: expected {:?}, got {:?}", vector.delta, delta));
    }

    Ok(())
}

/// Verify all vectors.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| match check_vector(v) {
            Ok(()) => (v.name.clone(), true, String::new()),
            Err(e) => (v.name.clone(), false, e),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        let results = verify_all_vectors();
        let failures: Vec<_> = results.iter().filter(|(_, ok, _)| !ok).collect();
        assert!(failures.is_empty(), "failing vectors: {failures:?}");
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }

    #[test]
    fn test_vectors_serialize() {
        let json = serde_json::to_string_pretty(&all_vectors()).unwrap();
        let parsed: Vec<PayloadVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), all_vectors().len());
    }
}
