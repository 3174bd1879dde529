//! Per-entity configuration.
//!
//! Every synchronized entity type is described by an [`EntityConfig`]: how
//! its records are recognized in push payloads, how they are identified,
//! and how incoming lists are merged into the cache.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::reconcile::MergePolicy;
use crate::record::IdentityKeys;

/// Configuration for one entity type.
///
/// Deserializes from JSON with camelCase keys. Only `entity` is required:
///
/// ```text
/// {
///   "entity": "Announcement",
///   "subscriptionField": "subscribeToCalcAnnouncements",
///   "policy": "FieldPreservingMerge",
///   "protectedFields": ["read"],
///   "identityKeys": ["id", "ID"],
///   "entityShapeHint": ["title", "content"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Entity name as used in mutation wrappers (`create<Entity>`).
    pub entity: String,
    /// Field under `data` carrying the live subscription list.
    #[serde(default)]
    pub subscription_field: Option<String>,
    /// How incoming lists are merged into the cache.
    #[serde(default)]
    pub policy: MergePolicy,
    /// Fields whose cached value survives when an incoming record omits them.
    #[serde(default)]
    pub protected_fields: Vec<String>,
    /// Identity field names in priority order.
    #[serde(default)]
    pub identity_keys: IdentityKeys,
    /// Domain fields that mark an object as "looks like this entity".
    #[serde(default)]
    pub entity_shape_hint: Vec<String>,
}

impl EntityConfig {
    /// Create a configuration with defaults for everything but the name.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            subscription_field: None,
            policy: MergePolicy::default(),
            protected_fields: Vec::new(),
            identity_keys: IdentityKeys::default(),
            entity_shape_hint: Vec::new(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.identity_keys.is_empty() {
            return Err(CoreError::EmptyIdentityKeys(self.entity.clone()));
        }
        Ok(())
    }

    pub fn with_subscription_field(mut self, field: impl Into<String>) -> Self {
        self.subscription_field = Some(field.into());
        self
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_protected_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_identity_keys(mut self, keys: IdentityKeys) -> Self {
        self.identity_keys = keys;
        self
    }

    pub fn with_shape_hint<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_shape_hint = fields.into_iter().map(Into::into).collect();
        self
    }
}
