//! Record: the canonical unit of synchronized data.
//!
//! A record is an ordered field map with one designated identity field.
//! Which field carries the identity is not fixed across entity types, so
//! the identity is always resolved through a prioritized [`IdentityKeys`]
//! list.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity keys checked when no explicit list is configured.
pub const DEFAULT_IDENTITY_KEYS: [&str; 4] = ["id", "ID", "unique_id", "Unique_ID"];

/// The identity of a record within its entity type.
///
/// String and integer identities are both carried as strings, so `"5"` and
/// `5` name the same record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read an identity out of a field value.
    ///
    /// Only non-empty strings and integers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else {
                    n.as_u64().map(|u| Self(u.to_string()))
                }
            }
            _ => None,
        }
    }

    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prioritized list of candidate identity field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKeys(Vec<String>);

impl IdentityKeys {
    /// Create from an explicit priority list.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Iterate the keys in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for IdentityKeys {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_KEYS)
    }
}

/// An ordered mapping from field name to value.
///
/// Field order is insertion order and survives serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value. Returns `None` for non-objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Build a record from a borrowed JSON value. Returns `None` for non-objects.
    pub fn from_value_ref(value: &Value) -> Option<Self> {
        value.as_object().map(|map| Self(map.clone()))
    }

    /// Resolve the identity using the first present, non-empty key.
    pub fn identity(&self, keys: &IdentityKeys) -> Option<Identity> {
        keys.iter()
            .find_map(|key| self.0.get(key).and_then(Identity::from_value))
    }

    /// Whether any configured identity key resolves to a usable identity.
    pub fn has_identity(&self, keys: &IdentityKeys) -> bool {
        self.identity(keys).is_some()
    }

    /// Whether at least one of the hinted domain fields is present.
    ///
    /// An empty hint never matches.
    pub fn looks_like<S: AsRef<str>>(&self, hint: &[S]) -> bool {
        hint.iter().any(|field| self.0.contains_key(field.as_ref()))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// True when the field is missing or explicitly null.
    pub fn is_absent(&self, field: &str) -> bool {
        matches!(self.0.get(field), None | Some(Value::Null))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
