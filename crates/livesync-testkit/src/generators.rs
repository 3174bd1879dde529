//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use livesync_core::{MergePolicy, Record};

/// Generate an identity drawn from a small pool, so lists collide.
pub fn identity() -> impl Strategy<Value = String> {
    (0u8..12).prop_map(|n| format!("rec-{n}"))
}

/// Generate a scalar field value, nulls included.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z ]{0,12}".prop_map(Value::String),
    ]
}

/// Generate a field name that is never an identity key.
pub fn field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("task".to_string()),
        Just("title".to_string()),
        Just("read".to_string()),
        Just("status".to_string()),
        "[a-z]{1,6}_[a-z]{1,6}",
    ]
}

/// Generate a record with an `id` and a few other fields.
pub fn record() -> impl Strategy<Value = Record> {
    (identity(), prop::collection::vec((field_name(), scalar()), 0..5)).prop_map(
        |(id, fields)| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(id));
            for (name, value) in fields {
                map.insert(name, value);
            }
            Record::from(map)
        },
    )
}

/// Generate a record without any identity field.
pub fn anonymous_record() -> impl Strategy<Value = Record> {
    prop::collection::vec((field_name(), scalar()), 1..4).prop_map(|fields| {
        let mut map = Map::new();
        for (name, value) in fields {
            map.insert(name, value);
        }
        Record::from(map)
    })
}

/// Generate a list of records, identities possibly repeated.
pub fn record_list(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record(), 0..=max_len)
}

/// Generate a non-empty list of records.
pub fn non_empty_record_list(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record(), 1..=max_len.max(1))
}

/// Generate a non-empty list mixing identified and anonymous records.
pub fn mixed_record_list(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(
        prop_oneof![4 => record().boxed(), 1 => anonymous_record().boxed()],
        1..=max_len.max(1),
    )
}

/// Generate a merge policy.
pub fn merge_policy() -> impl Strategy<Value = MergePolicy> {
    prop_oneof![
        Just(MergePolicy::ReplaceAll),
        Just(MergePolicy::UpsertList),
        Just(MergePolicy::FieldPreservingMerge),
    ]
}

/// Generate an arbitrary JSON value of bounded depth.
pub fn json_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_core::IdentityKeys;

    proptest! {
        #[test]
        fn test_generated_records_have_identity(record in record()) {
            prop_assert!(record.has_identity(&IdentityKeys::default()));
        }

        #[test]
        fn test_anonymous_records_have_no_identity(record in anonymous_record()) {
            prop_assert!(!record.has_identity(&IdentityKeys::default()));
        }

        #[test]
        fn test_non_empty_lists(list in non_empty_record_list(8)) {
            prop_assert!(!list.is_empty());
            prop_assert!(list.len() <= 8);
        }
    }
}
