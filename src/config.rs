//! Per-type federation configuration
//!
//! The declarative part (keys, `extend`, field directives) can be written in
//! code or loaded from JSON using the familiar camelCase layout:
//!
//! ```json
//! {
//!   "Product": { "keyFields": ["id"], "extend": true },
//!   "User": { "keyFields": [["id"], ["email"]] }
//! }
//! ```
//!
//! Reference resolvers are attached in code.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::executable::ResolveInfo;
use crate::types::Representation;

/// Resolves an entity representation to the entity's field values
///
/// Implemented for closures wrapped with [`reference_fn`].
#[async_trait]
pub trait ResolveReference: Send + Sync {
    async fn resolve_reference(
        &self,
        reference: Representation,
        info: &ResolveInfo<'_>,
    ) -> async_graphql::Result<Value>;
}

#[async_trait]
impl<F> ResolveReference for F
where
    F: for<'a> Fn(Representation, &'a ResolveInfo<'a>) -> BoxFuture<'a, async_graphql::Result<Value>>
        + Send
        + Sync,
{
    async fn resolve_reference(
        &self,
        reference: Representation,
        info: &ResolveInfo<'_>,
    ) -> async_graphql::Result<Value> {
        (self)(reference, info).await
    }
}

/// Pin a closure to the signature [`ResolveReference`] expects
pub fn reference_fn<F>(f: F) -> F
where
    F: for<'a> Fn(Representation, &'a ResolveInfo<'a>) -> BoxFuture<'a, async_graphql::Result<Value>>
        + Send
        + Sync
        + 'static,
{
    f
}

/// Federation settings for every configured type, in declaration order
#[derive(Clone, Default, Debug, Deserialize)]
#[serde(transparent)]
pub struct FederationConfig {
    types: IndexMap<String, FederationObjectConfig>,
}

impl FederationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from an already parsed JSON value, keeping its key order
    pub fn from_json_value(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Add or replace the settings of one type
    pub fn with_type(mut self, type_name: impl Into<String>, config: FederationObjectConfig) -> Self {
        self.types.insert(type_name.into(), config);
        self
    }

    /// Attach a reference resolver, creating the type entry if needed
    pub fn resolve_reference(
        mut self,
        type_name: impl Into<String>,
        resolver: impl ResolveReference + 'static,
    ) -> Self {
        let entry = self.types.entry(type_name.into()).or_default();
        entry.resolve_reference = Some(Arc::new(resolver));
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&FederationObjectConfig> {
        self.types.get(type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FederationObjectConfig)> {
        self.types.iter().map(|(name, config)| (name.as_str(), config))
    }
}

/// Federation settings of a single type
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FederationObjectConfig {
    /// Key field sets; each set becomes one `@key` directive
    #[serde(default, rename = "keyFields", deserialize_with = "deserialize_key_sets")]
    pub keys: Vec<Vec<String>>,

    /// Mark the type `@extends` (owned by another service)
    #[serde(default)]
    pub extend: bool,

    /// Field-level directives, keyed by field name
    #[serde(default)]
    pub fields: IndexMap<String, FederationFieldConfig>,

    #[serde(skip)]
    pub resolve_reference: Option<Arc<dyn ResolveReference>>,
}

impl FederationObjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key field set, e.g. `["id"]` or `["org", "user"]`
    ///
    /// Empty sets are ignored.
    pub fn key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if !fields.is_empty() {
            self.keys.push(fields);
        }
        self
    }

    pub fn extend(mut self, extend: bool) -> Self {
        self.extend = extend;
        self
    }

    pub fn field(mut self, name: impl Into<String>, config: FederationFieldConfig) -> Self {
        self.fields.insert(name.into(), config);
        self
    }

    pub fn resolve_reference(mut self, resolver: impl ResolveReference + 'static) -> Self {
        self.resolve_reference = Some(Arc::new(resolver));
        self
    }

    /// Whether the type declares at least one key
    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }
}

impl fmt::Debug for FederationObjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationObjectConfig")
            .field("keys", &self.keys)
            .field("extend", &self.extend)
            .field("fields", &self.fields)
            .field("resolve_reference", &self.resolve_reference.is_some())
            .finish()
    }
}

/// Federation directives on a single field
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FederationFieldConfig {
    /// `@external`: the field is owned by another service
    #[serde(default)]
    pub external: bool,

    /// `@requires(fields: "...")`
    #[serde(default)]
    pub requires: Option<String>,

    /// `@provides(fields: "...")`
    #[serde(default)]
    pub provides: Option<String>,
}

impl FederationFieldConfig {
    pub fn external() -> Self {
        Self {
            external: true,
            ..Self::default()
        }
    }

    pub fn requires(fields: impl Into<String>) -> Self {
        Self {
            requires: Some(fields.into()),
            ..Self::default()
        }
    }

    pub fn provides(fields: impl Into<String>) -> Self {
        Self {
            provides: Some(fields.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.external && self.requires.is_none() && self.provides.is_none()
    }
}

/// Accept `["id"]` (one key set) or `[["id"], ["sku", "pkg"]]` (several)
fn deserialize_key_sets<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum KeySets {
        Single(Vec<String>),
        Multiple(Vec<Vec<String>>),
    }

    let sets = match KeySets::deserialize(deserializer)? {
        KeySets::Single(fields) => vec![fields],
        KeySets::Multiple(sets) => sets,
    };
    Ok(sets.into_iter().filter(|set| !set.is_empty()).collect())
}
