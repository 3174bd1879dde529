//! Reconciliation: merging normalized input into a cache.
//!
//! [`reconcile`] is pure. It never touches the input cache; it returns the
//! next cache together with a summary of what was applied.
//!
//! Invariant: no two records in a cache produced here share an identity.
//! Records without a resolvable identity never collide with anything. The
//! replacing policies carry them as-is; upserts skip them, since a later
//! event could never match them again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::EntityConfig;
use crate::envelope::{Delta, DeltaKind, Normalized};
use crate::record::{Identity, IdentityKeys, Record};

/// How an incoming record list is merged into the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergePolicy {
    /// The incoming list becomes the new cache.
    #[default]
    ReplaceAll,
    /// Update by identity in place, append new records, never delete.
    UpsertList,
    /// Like `ReplaceAll`, but protected fields the incoming record omits or
    /// nulls keep their cached value.
    FieldPreservingMerge,
}

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Cache replaced by the incoming list.
    Replaced { len: usize },
    /// Cache replaced, `preserved` protected values carried over.
    Merged { len: usize, preserved: usize },
    /// Incoming list upserted entry by entry. Records without an identity
    /// cannot be matched on a later event and are `skipped`.
    Upserted {
        updated: usize,
        appended: usize,
        skipped: usize,
    },
    /// Delta replaced the cached record in place.
    DeltaUpdated { kind: DeltaKind, identity: Identity },
    /// Delta was new and went to the front.
    DeltaPrepended { kind: DeltaKind, identity: Identity },
    /// Delta had no identity and was skipped.
    DeltaIgnored { kind: DeltaKind },
    /// Nothing to apply.
    Unchanged,
}

impl Applied {
    /// Whether the cache may differ from the input cache.
    pub fn changed(&self) -> bool {
        match self {
            Applied::Unchanged | Applied::DeltaIgnored { .. } => false,
            Applied::Upserted {
                updated, appended, ..
            } => updated + appended > 0,
            _ => true,
        }
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub cache: Vec<Record>,
    pub applied: Applied,
}

/// Merge normalized input into `cache` under the entity's policy.
///
/// - non-empty `records`: apply the merge policy
/// - otherwise a `delta`: upsert by identity (in place, else prepend)
/// - otherwise: the cache is returned unchanged
pub fn reconcile(cache: &[Record], input: Normalized, config: &EntityConfig) -> Reconciled {
    let keys = &config.identity_keys;

    if !input.records.is_empty() {
        return match config.policy {
            MergePolicy::ReplaceAll => {
                let next = dedupe(input.records, keys);
                Reconciled {
                    applied: Applied::Replaced { len: next.len() },
                    cache: next,
                }
            }
            MergePolicy::UpsertList => upsert_list(cache, input.records, keys),
            MergePolicy::FieldPreservingMerge => {
                field_preserving(cache, input.records, keys, &config.protected_fields)
            }
        };
    }

    match input.delta {
        Some(delta) => upsert_delta(cache, delta, config),
        None => Reconciled {
            cache: cache.to_vec(),
            applied: Applied::Unchanged,
        },
    }
}

/// Position of every identified record, first occurrence wins.
fn index_of(records: &[Record], keys: &IdentityKeys) -> HashMap<Identity, usize> {
    let mut index = HashMap::with_capacity(records.len());
    for (pos, record) in records.iter().enumerate() {
        if let Some(id) = record.identity(keys) {
            index.entry(id).or_insert(pos);
        }
    }
    index
}

/// Collapse repeated identities: first position, last value.
fn dedupe(records: Vec<Record>, keys: &IdentityKeys) -> Vec<Record> {
    let mut out: Vec<Record> = Vec::with_capacity(records.len());
    let mut index = HashMap::with_capacity(records.len());

    for record in records {
        match record.identity(keys) {
            Some(id) => match index.entry(id) {
                Entry::Occupied(slot) => out[*slot.get()] = record,
                Entry::Vacant(slot) => {
                    slot.insert(out.len());
                    out.push(record);
                }
            },
            None => out.push(record),
        }
    }

    out
}

fn upsert_list(cache: &[Record], records: Vec<Record>, keys: &IdentityKeys) -> Reconciled {
    let mut next = cache.to_vec();
    let mut index = index_of(&next, keys);
    let (mut updated, mut appended, mut skipped) = (0, 0, 0);

    for record in records {
        let Some(id) = record.identity(keys) else {
            skipped += 1;
            continue;
        };
        match index.entry(id) {
            Entry::Occupied(slot) => {
                next[*slot.get()] = record;
                updated += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(next.len());
                next.push(record);
                appended += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "upsert skipped records without identity");
    }

    Reconciled {
        cache: next,
        applied: Applied::Upserted {
            updated,
            appended,
            skipped,
        },
    }
}

fn field_preserving(
    cache: &[Record],
    records: Vec<Record>,
    keys: &IdentityKeys,
    protected: &[String],
) -> Reconciled {
    let existing = index_of(cache, keys);
    let mut preserved = 0;

    let next: Vec<Record> = dedupe(records, keys)
        .into_iter()
        .map(|incoming| {
            let previous = incoming
                .identity(keys)
                .and_then(|id| existing.get(&id))
                .map(|&pos| &cache[pos]);
            match previous {
                Some(previous) => {
                    let (merged, count) = preserve_fields(previous, incoming, protected);
                    preserved += count;
                    merged
                }
                None => incoming,
            }
        })
        .collect();

    Reconciled {
        applied: Applied::Merged {
            len: next.len(),
            preserved,
        },
        cache: next,
    }
}

/// Carry protected values from `previous` into `incoming` where the
/// incoming record omits or nulls them. All other fields come from
/// `incoming`, explicit nulls included.
fn preserve_fields(previous: &Record, mut incoming: Record, protected: &[String]) -> (Record, usize) {
    let mut count = 0;
    for field in protected {
        if !incoming.is_absent(field) {
            continue;
        }
        if let Some(value) = previous.get(field).filter(|value| !value.is_null()) {
            incoming.insert(field.clone(), value.clone());
            count += 1;
        }
    }
    (incoming, count)
}

fn upsert_delta(cache: &[Record], delta: Delta, config: &EntityConfig) -> Reconciled {
    let keys = &config.identity_keys;
    let Delta { kind, record } = delta;

    let Some(identity) = record.identity(keys) else {
        return Reconciled {
            cache: cache.to_vec(),
            applied: Applied::DeltaIgnored { kind },
        };
    };

    let position = cache
        .iter()
        .position(|cached| cached.identity(keys).as_ref() == Some(&identity));

    match position {
        Some(pos) => {
            let record = if config.policy == MergePolicy::FieldPreservingMerge {
                preserve_fields(&cache[pos], record, &config.protected_fields).0
            } else {
                record
            };
            let mut next = cache.to_vec();
            next[pos] = record;
            Reconciled {
                cache: next,
                applied: Applied::DeltaUpdated { kind, identity },
            }
        }
        None => {
            let mut next = Vec::with_capacity(cache.len() + 1);
            next.push(record);
            next.extend_from_slice(cache);
            Reconciled {
                cache: next,
                applied: Applied::DeltaPrepended { kind, identity },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn records(value: Value) -> Vec<Record> {
        match value {
            Value::Array(items) => items.into_iter().filter_map(Record::from_value).collect(),
            _ => panic!("expected array"),
        }
    }

    fn list(value: Value) -> Normalized {
        Normalized {
            records: records(value),
            delta: None,
        }
    }

    fn delta(kind: DeltaKind, value: Value) -> Normalized {
        Normalized {
            records: Vec::new(),
            delta: Some(Delta {
                kind,
                record: Record::from_value(value).unwrap(),
            }),
        }
    }

    fn config(policy: MergePolicy) -> EntityConfig {
        EntityConfig::new("Activity").with_policy(policy)
    }

    #[test]
    fn test_replace_all_is_idempotent() {
        let cfg = config(MergePolicy::ReplaceAll);
        let cache = records(json!([{ "id": "9" }]));
        let incoming = json!([{ "id": "1", "a": 1 }, { "id": "2" }]);

        let once = reconcile(&cache, list(incoming.clone()), &cfg).cache;
        let twice = reconcile(&once, list(incoming), &cfg).cache;
        assert_eq!(once, twice);
        assert_eq!(once, records(json!([{ "id": "1", "a": 1 }, { "id": "2" }])));
    }

    #[test]
    fn test_replace_all_collapses_duplicates() {
        let cfg = config(MergePolicy::ReplaceAll);
        let incoming = json!([{ "id": "1", "v": 1 }, { "id": "2" }, { "id": 1, "v": 2 }]);
        let result = reconcile(&[], list(incoming), &cfg).cache;
        assert_eq!(result, records(json!([{ "id": 1, "v": 2 }, { "id": "2" }])));
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let cfg = config(MergePolicy::UpsertList);
        let cache = records(json!([{ "id": "1", "v": 1 }, { "id": "2", "v": 1 }]));
        let result = reconcile(&cache, list(json!([{ "id": "1", "v": 2 }])), &cfg);

        assert_eq!(result.cache.len(), cache.len());
        assert_eq!(
            result.cache,
            records(json!([{ "id": "1", "v": 2 }, { "id": "2", "v": 1 }]))
        );
        assert_eq!(result.applied, Applied::Upserted { updated: 1, appended: 0, skipped: 0 });
    }

    #[test]
    fn test_upsert_appends_new_records() {
        let cfg = config(MergePolicy::UpsertList);
        let cache = records(json!([{ "id": "1" }]));
        let result = reconcile(&cache, list(json!([{ "id": "3" }, { "id": "1", "x": 1 }])), &cfg);
        assert_eq!(result.cache, records(json!([{ "id": "1", "x": 1 }, { "id": "3" }])));
        assert_eq!(result.applied, Applied::Upserted { updated: 1, appended: 1, skipped: 0 });
    }

    #[test]
    fn test_protected_field_preserved() {
        let cfg = config(MergePolicy::FieldPreservingMerge).with_protected_fields(["read"]);
        let cache = records(json!([{ "id": "1", "title": "A", "read": false }]));
        let result = reconcile(&cache, list(json!([{ "id": "1", "title": "A" }])), &cfg);

        assert_eq!(result.cache, records(json!([{ "id": "1", "title": "A", "read": false }])));
        assert_eq!(result.applied, Applied::Merged { len: 1, preserved: 1 });
    }

    #[test]
    fn test_protected_field_survives_explicit_null() {
        let cfg = config(MergePolicy::FieldPreservingMerge).with_protected_fields(["read"]);
        let cache = records(json!([{ "id": "1", "read": true }]));
        let result = reconcile(&cache, list(json!([{ "id": "1", "read": null }])), &cfg).cache;
        assert_eq!(result, records(json!([{ "id": "1", "read": true }])));
    }

    #[test]
    fn test_unprotected_null_clears() {
        let cfg = config(MergePolicy::FieldPreservingMerge).with_protected_fields(["read"]);
        let cache = records(json!([{ "id": "1", "title": "A", "read": true }]));
        let result = reconcile(&cache, list(json!([{ "id": "1", "title": null }])), &cfg).cache;
        assert_eq!(result, records(json!([{ "id": "1", "title": null, "read": true }])));
    }

    #[test]
    fn test_incoming_protected_value_wins() {
        let cfg = config(MergePolicy::FieldPreservingMerge).with_protected_fields(["read"]);
        let cache = records(json!([{ "id": "1", "read": false }]));
        let result = reconcile(&cache, list(json!([{ "id": "1", "read": true }])), &cfg).cache;
        assert_eq!(result, records(json!([{ "id": "1", "read": true }])));
    }

    fn mark_as_read(policy: MergePolicy) -> Vec<Record> {
        let cfg = config(policy);
        let cache = records(json!([
            { "id": "1", "read": false },
            { "id": "2", "read": false },
            { "id": "3", "read": true }
        ]));
        let incoming = json!([{ "id": "1", "read": true }, { "id": "2", "read": true }]);
        reconcile(&cache, list(incoming), &cfg).cache
    }

    #[test]
    fn test_bulk_mark_as_read_upsert_keeps_untouched() {
        assert_eq!(
            mark_as_read(MergePolicy::UpsertList),
            records(json!([
                { "id": "1", "read": true },
                { "id": "2", "read": true },
                { "id": "3", "read": true }
            ]))
        );
    }

    #[test]
    fn test_bulk_mark_as_read_replace_all_drops_absent() {
        assert_eq!(
            mark_as_read(MergePolicy::ReplaceAll),
            records(json!([{ "id": "1", "read": true }, { "id": "2", "read": true }]))
        );
    }

    #[test]
    fn test_bulk_mark_as_read_field_preserving_drops_absent() {
        assert_eq!(
            mark_as_read(MergePolicy::FieldPreservingMerge),
            records(json!([{ "id": "1", "read": true }, { "id": "2", "read": true }]))
        );
    }

    #[test]
    fn test_delta_prepends_into_empty() {
        let cfg = config(MergePolicy::ReplaceAll);
        let result = reconcile(
            &[],
            delta(DeltaKind::Create, json!({ "id": "5", "task": "Fix gutter" })),
            &cfg,
        );
        assert_eq!(result.cache, records(json!([{ "id": "5", "task": "Fix gutter" }])));
        assert_eq!(
            result.applied,
            Applied::DeltaPrepended {
                kind: DeltaKind::Create,
                identity: Identity::new("5"),
            }
        );
    }

    #[test]
    fn test_delta_prepends_before_existing() {
        let cfg = config(MergePolicy::UpsertList);
        let cache = records(json!([{ "id": "1" }]));
        let result = reconcile(&cache, delta(DeltaKind::Create, json!({ "id": "2" })), &cfg);
        assert_eq!(result.cache, records(json!([{ "id": "2" }, { "id": "1" }])));
    }

    #[test]
    fn test_delta_updates_in_place() {
        let cfg = config(MergePolicy::ReplaceAll);
        let cache = records(json!([{ "id": "4" }, { "id": "5", "task": "Fix gutter" }, { "id": "6" }]));
        let result = reconcile(
            &cache,
            delta(DeltaKind::Update, json!({ "id": "5", "task": "Fix gutter, urgent" })),
            &cfg,
        );
        assert_eq!(
            result.cache,
            records(json!([{ "id": "4" }, { "id": "5", "task": "Fix gutter, urgent" }, { "id": "6" }]))
        );
    }

    #[test]
    fn test_delete_delta_is_upserted() {
        let cfg = config(MergePolicy::ReplaceAll);
        let cache = records(json!([{ "id": "5", "status": "open" }]));
        let result = reconcile(
            &cache,
            delta(DeltaKind::Delete, json!({ "id": "5", "status": "deleted" })),
            &cfg,
        );
        assert_eq!(result.cache, records(json!([{ "id": "5", "status": "deleted" }])));
    }

    #[test]
    fn test_delta_update_preserves_protected_fields() {
        let cfg = config(MergePolicy::FieldPreservingMerge).with_protected_fields(["read"]);
        let cache = records(json!([{ "id": "5", "title": "A", "read": true }]));
        let result = reconcile(&cache, delta(DeltaKind::Update, json!({ "id": "5", "title": "B" })), &cfg);
        assert_eq!(result.cache, records(json!([{ "id": "5", "title": "B", "read": true }])));
    }

    #[test]
    fn test_delta_without_identity_is_ignored() {
        let cfg = config(MergePolicy::ReplaceAll);
        let cache = records(json!([{ "id": "1" }]));
        let result = reconcile(&cache, delta(DeltaKind::Create, json!({ "task": "x" })), &cfg);
        assert_eq!(result.cache, cache);
        assert!(!result.applied.changed());
    }

    #[test]
    fn test_upsert_skips_records_without_identity() {
        let cfg = config(MergePolicy::UpsertList);
        let cache = records(json!([{ "id": "1" }]));

        let once = reconcile(&cache, list(json!([{ "task": "x" }, { "id": "2" }])), &cfg);
        assert_eq!(once.cache, records(json!([{ "id": "1" }, { "id": "2" }])));
        assert_eq!(
            once.applied,
            Applied::Upserted { updated: 0, appended: 1, skipped: 1 }
        );

        let twice = reconcile(&once.cache, list(json!([{ "task": "x" }])), &cfg);
        assert_eq!(twice.cache, once.cache);
        assert!(!twice.applied.changed());
    }

    #[test]
    fn test_empty_input_leaves_cache() {
        let cfg = config(MergePolicy::ReplaceAll);
        let cache = records(json!([{ "id": "1" }]));
        let result = reconcile(&cache, Normalized::default(), &cfg);
        assert_eq!(result.cache, cache);
        assert_eq!(result.applied, Applied::Unchanged);
    }

    #[test]
    fn test_records_win_over_delta() {
        let cfg = config(MergePolicy::ReplaceAll);
        let input = Normalized {
            records: records(json!([{ "id": "1" }])),
            delta: Some(Delta {
                kind: DeltaKind::Create,
                record: Record::from_value(json!({ "id": "2" })).unwrap(),
            }),
        };
        let result = reconcile(&[], input, &cfg);
        assert_eq!(result.cache, records(json!([{ "id": "1" }])));
    }
}
