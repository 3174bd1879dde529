//! Query identifiers passed to the backend and to live transports.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies the backend query a channel is synchronized against.
///
/// The query language itself is opaque here; `variables` are forwarded to
/// the backend untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Query (or subscription) name, unique per channel.
    pub name: String,
    /// Backend-specific variables.
    #[serde(default)]
    pub variables: Value,
}

impl QuerySpec {
    /// Create a query without variables.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Value::Null,
        }
    }

    /// Attach backend variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
