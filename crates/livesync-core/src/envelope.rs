//! Payload normalization.
//!
//! The backend delivers structurally different envelopes depending on
//! whether an event came from a direct fetch, a live list subscription, or
//! a point mutation broadcast. [`classify`] maps any payload onto a closed
//! set of shapes ([`Envelope`]); [`normalize`] turns that into the
//! `records` / `delta` pair the reconciler consumes.
//!
//! Shapes are tried from cheapest and most specific to most generic, and
//! the first match wins:
//!
//! 1. known list locations: `records`, `resp`, `data.<subscriptionField>`,
//!    then the same three under an outer `payload` key
//! 2. a bare record that has an identity and looks like the entity
//! 3. deep search for the first array whose first element looks like the
//!    entity
//! 4. a bare array
//! 5. a mutation result under `data.create<Entity>`, `data.update<Entity>`
//!    or `data.delete<Entity>` (and the `payload.` equivalents)
//!
//! Anything else is [`Envelope::Unknown`], a valid no-op.

use std::fmt;

use serde_json::Value;

use crate::config::EntityConfig;
use crate::record::Record;

/// Maximum nesting depth visited by the deep search.
///
/// This is the only bound on the walk: every container above this depth is
/// visited, however wide the payload is.
pub const MAX_SEARCH_DEPTH: usize = 32;

/// Which part of the payload a known location was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top level of the payload.
    Root,
    /// Under the outer `payload` key.
    Payload,
}

/// Where a record list was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLocation {
    Records(Scope),
    Resp(Scope),
    Data(Scope),
    DeepSearch,
    BareArray,
}

impl fmt::Display for ListLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (scope, key) = match self {
            ListLocation::Records(scope) => (scope, "records"),
            ListLocation::Resp(scope) => (scope, "resp"),
            ListLocation::Data(scope) => (scope, "data"),
            ListLocation::DeepSearch => return f.write_str("deep-search"),
            ListLocation::BareArray => return f.write_str("bare-array"),
        };
        match scope {
            Scope::Root => f.write_str(key),
            Scope::Payload => write!(f, "payload.{key}"),
        }
    }
}

/// Mutation wrapper a delta was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Create,
    Update,
    Delete,
}

impl DeltaKind {
    const ALL: [DeltaKind; 3] = [DeltaKind::Create, DeltaKind::Update, DeltaKind::Delete];

    /// Wrapper key for an entity, e.g. `updateActivity`.
    pub fn wrapper_key(&self, entity: &str) -> String {
        let verb = match self {
            DeltaKind::Create => "create",
            DeltaKind::Update => "update",
            DeltaKind::Delete => "delete",
        };
        format!("{verb}{entity}")
    }
}

/// A single record extracted from a mutation-shaped payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub kind: DeltaKind,
    pub record: Record,
}

/// The recognized payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A non-empty list of records.
    List {
        location: ListLocation,
        records: Vec<Record>,
    },
    /// A bare record that looks like the entity.
    Single(Record),
    /// A create/update/delete result.
    Mutation(Delta),
    /// Nothing recognizable (heartbeats, keepalives, foreign events).
    Unknown,
}

impl Envelope {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Envelope::List { .. } => "list",
            Envelope::Single(_) => "single",
            Envelope::Mutation(_) => "mutation",
            Envelope::Unknown => "unknown",
        }
    }
}

/// Canonical reconciler input.
///
/// At most one side is meaningful: `records` when non-empty, otherwise
/// `delta`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub delta: Option<Delta>,
}

impl Normalized {
    /// True for a normalization miss.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.delta.is_none()
    }
}

impl From<Envelope> for Normalized {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::List { records, .. } => Normalized {
                records,
                delta: None,
            },
            Envelope::Single(record) => Normalized {
                records: vec![record],
                delta: None,
            },
            Envelope::Mutation(delta) => Normalized {
                records: Vec::new(),
                delta: Some(delta),
            },
            Envelope::Unknown => Normalized::default(),
        }
    }
}

/// Normalize an arbitrary payload.
///
/// A string payload holding JSON text is parsed and normalized as that
/// value.
pub fn normalize(payload: &Value, config: &EntityConfig) -> Normalized {
    classify_text_aware(payload, config).into()
}

/// Classify, decoding JSON text first when the payload is a string.
pub fn classify_text_aware(payload: &Value, config: &EntityConfig) -> Envelope {
    match payload {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(decoded) if !decoded.is_string() => classify(&decoded, config),
            _ => Envelope::Unknown,
        },
        _ => classify(payload, config),
    }
}

/// Classify a payload into one of the recognized shapes.
pub fn classify(payload: &Value, config: &EntityConfig) -> Envelope {
    if let Some((location, records)) = known_list(payload, config) {
        return Envelope::List { location, records };
    }

    if let Some(record) = bare_record(payload, config) {
        return Envelope::Single(record);
    }

    if let Some(records) = deep_search(payload, &config.entity_shape_hint) {
        return Envelope::List {
            location: ListLocation::DeepSearch,
            records,
        };
    }

    if let Value::Array(items) = payload {
        let records = objects(items);
        if !records.is_empty() {
            return Envelope::List {
                location: ListLocation::BareArray,
                records,
            };
        }
    }

    if let Some(delta) = mutation(payload, config) {
        return Envelope::Mutation(delta);
    }

    Envelope::Unknown
}

fn scopes(payload: &Value) -> [(Scope, Option<&Value>); 2] {
    [
        (Scope::Root, Some(payload)),
        (Scope::Payload, payload.get("payload")),
    ]
}

fn known_list(payload: &Value, config: &EntityConfig) -> Option<(ListLocation, Vec<Record>)> {
    for (scope, root) in scopes(payload) {
        let Some(root) = root else { continue };

        if let Some(records) = list_at(root.get("records")) {
            return Some((ListLocation::Records(scope), records));
        }
        if let Some(records) = list_at(root.get("resp")) {
            return Some((ListLocation::Resp(scope), records));
        }
        if let Some(field) = &config.subscription_field {
            let value = root.get("data").and_then(|data| data.get(field.as_str()));
            if let Some(records) = list_at(value) {
                return Some((ListLocation::Data(scope), records));
            }
        }
    }
    None
}

/// An array of records, or a single object wrapped as a one-element list.
fn list_at(value: Option<&Value>) -> Option<Vec<Record>> {
    let records = match value? {
        Value::Array(items) => objects(items),
        object @ Value::Object(_) => Record::from_value_ref(object).into_iter().collect(),
        _ => return None,
    };
    (!records.is_empty()).then_some(records)
}

fn objects(items: &[Value]) -> Vec<Record> {
    items.iter().filter_map(Record::from_value_ref).collect()
}

fn bare_record(payload: &Value, config: &EntityConfig) -> Option<Record> {
    let record = Record::from_value_ref(payload)?;
    (record.has_identity(&config.identity_keys) && record.looks_like(&config.entity_shape_hint))
        .then_some(record)
}

fn looks_like(value: &Value, hint: &[String]) -> bool {
    value
        .as_object()
        .is_some_and(|map| hint.iter().any(|field| map.contains_key(field)))
}

/// Pre-order walk for the first array whose first element looks like the
/// entity.
///
/// JSON values are owned trees, so the walk cannot revisit a node and needs
/// no visited set. Containers nested deeper than [`MAX_SEARCH_DEPTH`] are
/// not descended into.
fn deep_search(payload: &Value, hint: &[String]) -> Option<Vec<Record>> {
    if hint.is_empty() {
        return None;
    }

    let mut stack = vec![(payload, 0usize)];
    let mut pruned = false;

    while let Some((node, depth)) = stack.pop() {
        let children: Vec<&Value> = match node {
            Value::Array(items) => {
                if items.first().is_some_and(|first| looks_like(first, hint)) {
                    return Some(objects(items));
                }
                items.iter().collect()
            }
            Value::Object(map) => map.values().collect(),
            _ => continue,
        };

        let mut nested = children
            .into_iter()
            .rev()
            .filter(|child| child.is_array() || child.is_object())
            .peekable();
        if depth >= MAX_SEARCH_DEPTH {
            pruned |= nested.peek().is_some();
            continue;
        }
        stack.extend(nested.map(|child| (child, depth + 1)));
    }

    if pruned {
        tracing::debug!(max_depth = MAX_SEARCH_DEPTH, "deep search stopped at depth limit");
    }
    None
}

fn mutation(payload: &Value, config: &EntityConfig) -> Option<Delta> {
    for (_, root) in scopes(payload) {
        let Some(data) = root.and_then(|root| root.get("data")) else {
            continue;
        };
        for kind in DeltaKind::ALL {
            let key = kind.wrapper_key(&config.entity);
            if let Some(record) = data.get(key.as_str()).and_then(Record::from_value_ref) {
                return Some(Delta { kind, record });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MergePolicy;
    use serde_json::json;

    fn activities() -> EntityConfig {
        EntityConfig::new("Activity")
            .with_subscription_field("subscribeToCalcActivities")
            .with_shape_hint(["task", "activity_status"])
    }

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_records_array() {
        let payload = json!({ "records": [{ "id": "1" }, { "id": "2" }] });
        let envelope = classify(&payload, &activities());
        assert_eq!(
            envelope,
            Envelope::List {
                location: ListLocation::Records(Scope::Root),
                records: vec![record(json!({ "id": "1" })), record(json!({ "id": "2" }))],
            }
        );
    }

    #[test]
    fn test_records_object_is_wrapped() {
        let payload = json!({ "records": { "id": "1", "task": "Mow" } });
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records, vec![record(json!({ "id": "1", "task": "Mow" }))]);
        assert!(normalized.delta.is_none());
    }

    #[test]
    fn test_resp_location() {
        let payload = json!({ "resp": [{ "id": 3 }] });
        match classify(&payload, &activities()) {
            Envelope::List { location, records } => {
                assert_eq!(location, ListLocation::Resp(Scope::Root));
                assert_eq!(records.len(), 1);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_subscription_field_location() {
        let payload = json!({ "data": { "subscribeToCalcActivities": [{ "id": "9" }] } });
        match classify(&payload, &activities()) {
            Envelope::List { location, .. } => {
                assert_eq!(location, ListLocation::Data(Scope::Root));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_prefixed_location() {
        let payload = json!({
            "payload": { "data": { "subscribeToCalcActivities": [{ "id": "2", "task": "Fix gutter" }] } }
        });
        let envelope = classify(&payload, &activities());
        assert_eq!(
            envelope,
            Envelope::List {
                location: ListLocation::Data(Scope::Payload),
                records: vec![record(json!({ "id": "2", "task": "Fix gutter" }))],
            }
        );
    }

    #[test]
    fn test_root_locations_win_over_payload_prefix() {
        let payload = json!({
            "resp": [{ "id": "root" }],
            "payload": { "records": [{ "id": "nested" }] }
        });
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records, vec![record(json!({ "id": "root" }))]);
    }

    #[test]
    fn test_empty_known_list_falls_through() {
        let payload = json!({ "records": [], "resp": [{ "id": "1" }] });
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records, vec![record(json!({ "id": "1" }))]);
    }

    #[test]
    fn test_non_object_items_are_dropped() {
        let payload = json!({ "records": [1, "two", { "id": "3" }, null] });
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records, vec![record(json!({ "id": "3" }))]);
    }

    #[test]
    fn test_bare_single_record() {
        let payload = json!({ "id": "4", "task": "Clean windows" });
        assert_eq!(
            classify(&payload, &activities()),
            Envelope::Single(record(payload.clone()))
        );
    }

    #[test]
    fn test_bare_object_without_identity_is_not_single() {
        let payload = json!({ "task": "Clean windows" });
        assert_eq!(classify(&payload, &activities()), Envelope::Unknown);
    }

    #[test]
    fn test_bare_object_without_shape_is_not_single() {
        let payload = json!({ "id": "4", "email": "a@b.c" });
        assert_eq!(classify(&payload, &activities()), Envelope::Unknown);
    }

    #[test]
    fn test_deep_search_finds_nested_list() {
        let config = EntityConfig::new("Activity").with_shape_hint(["task"]);
        let payload = json!({
            "payload": { "data": { "subscribeToCalcActivities": [{ "id": "2", "task": "Fix gutter" }] } }
        });
        let envelope = classify(&payload, &config);
        assert_eq!(
            envelope,
            Envelope::List {
                location: ListLocation::DeepSearch,
                records: vec![record(json!({ "id": "2", "task": "Fix gutter" }))],
            }
        );
    }

    #[test]
    fn test_deep_search_skips_foreign_arrays() {
        let config = EntityConfig::new("Activity").with_shape_hint(["task"]);
        let payload = json!({
            "meta": { "tags": [{ "label": "x" }] },
            "event": { "items": [{ "id": "7", "task": "Paint" }] }
        });
        let normalized = normalize(&payload, &config);
        assert_eq!(normalized.records, vec![record(json!({ "id": "7", "task": "Paint" }))]);
    }

    #[test]
    fn test_deep_search_prefers_first_in_document_order() {
        let config = EntityConfig::new("Activity").with_shape_hint(["task"]);
        let payload = json!({
            "a": { "inner": [{ "task": "first" }] },
            "b": [{ "task": "second" }]
        });
        let normalized = normalize(&payload, &config);
        assert_eq!(normalized.records, vec![record(json!({ "task": "first" }))]);
    }

    #[test]
    fn test_deep_search_is_depth_bounded() {
        let config = EntityConfig::new("Activity").with_shape_hint(["task"]);
        let mut payload = json!([{ "id": "1", "task": "deep" }]);
        for _ in 0..(MAX_SEARCH_DEPTH + 4) {
            payload = json!({ "wrap": payload });
        }
        assert_eq!(classify(&payload, &config), Envelope::Unknown);
    }

    #[test]
    fn test_deep_search_reaches_list_after_wide_foreign_array() {
        let config = EntityConfig::new("Activity").with_shape_hint(["task"]);
        let log: Vec<Value> = (0..20_000).map(|n| json!({ "n": n })).collect();
        let payload = json!({
            "meta": { "log": log },
            "items": [{ "id": "1", "task": "t" }]
        });
        let normalized = normalize(&payload, &config);
        assert_eq!(normalized.records, vec![record(json!({ "id": "1", "task": "t" }))]);
    }

    #[test]
    fn test_bare_array() {
        let payload = json!([{ "id": "1" }, { "id": "2" }]);
        match classify(&payload, &activities()) {
            Envelope::List { location, records } => {
                assert_eq!(location, ListLocation::BareArray);
                assert_eq!(records.len(), 2);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_create_delta() {
        let payload = json!({ "data": { "createActivity": { "id": "5", "task": "Fix gutter" } } });
        let normalized = normalize(&payload, &EntityConfig::new("Activity"));
        assert!(normalized.records.is_empty());
        let delta = normalized.delta.unwrap();
        assert_eq!(delta.kind, DeltaKind::Create);
        assert_eq!(delta.record, record(json!({ "id": "5", "task": "Fix gutter" })));
    }

    #[test]
    fn test_null_wrapper_is_skipped() {
        let payload = json!({
            "data": { "createActivity": null, "updateActivity": { "id": "5" } }
        });
        let delta = normalize(&payload, &EntityConfig::new("Activity")).delta.unwrap();
        assert_eq!(delta.kind, DeltaKind::Update);
    }

    #[test]
    fn test_payload_prefixed_delete_delta() {
        let payload = json!({ "payload": { "data": { "deleteActivity": { "id": "5" } } } });
        let delta = normalize(&payload, &EntityConfig::new("Activity")).delta.unwrap();
        assert_eq!(delta.kind, DeltaKind::Delete);
    }

    #[test]
    fn test_mutation_for_other_entity_is_ignored() {
        let payload = json!({ "data": { "createContact": { "id": "5" } } });
        assert!(normalize(&payload, &EntityConfig::new("Activity")).is_empty());
    }

    #[test]
    fn test_list_takes_precedence_over_delta() {
        let payload = json!({
            "records": [{ "id": "1" }],
            "data": { "updateActivity": { "id": "5" } }
        });
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records.len(), 1);
        assert!(normalized.delta.is_none());
    }

    #[test]
    fn test_heartbeat_is_a_miss() {
        let config = activities().with_policy(MergePolicy::UpsertList);
        assert!(normalize(&json!({ "type": "ka" }), &config).is_empty());
        assert!(normalize(&Value::Null, &config).is_empty());
        assert!(normalize(&json!(42), &config).is_empty());
        assert!(normalize(&json!([]), &config).is_empty());
    }

    #[test]
    fn test_json_text_payload() {
        let payload = Value::String(r#"{ "records": [{ "id": "1" }] }"#.to_string());
        let normalized = normalize(&payload, &activities());
        assert_eq!(normalized.records, vec![record(json!({ "id": "1" }))]);

        let garbage = Value::String("not json".to_string());
        assert!(normalize(&garbage, &activities()).is_empty());
    }

    #[test]
    fn test_location_display() {
        assert_eq!(ListLocation::Records(Scope::Root).to_string(), "records");
        assert_eq!(ListLocation::Data(Scope::Payload).to_string(), "payload.data");
        assert_eq!(ListLocation::DeepSearch.to_string(), "deep-search");
    }
}
