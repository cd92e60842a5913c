//! Federation value types

use std::fmt;
use std::sync::Arc;

use async_graphql::{Name, Value};
use indexmap::IndexMap;

use crate::entities::EntityError;

/// Key that names the target type of a representation
pub const TYPENAME: &str = "__typename";

/// An entity representation received through `_entities`
///
/// Representations are opaque: besides `__typename`, any field may be present.
/// Only the target type's key fields are contractually meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    typename: String,
    fields: IndexMap<Name, Value>,
}

impl Representation {
    /// Parse a raw `_Any` value
    pub fn from_value(value: Value) -> Result<Self, EntityError> {
        let Value::Object(fields) = value else {
            return Err(EntityError::InvalidRepresentation);
        };

        let typename = match fields.get(&Name::new(TYPENAME)) {
            Some(Value::String(typename)) => typename.clone(),
            _ => return Err(EntityError::MissingTypename),
        };

        Ok(Self { typename, fields })
    }

    pub fn typename(&self) -> &str {
        &self.typename
    }

    /// Get a field value by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(&Name::new(field))
    }

    /// All fields, `__typename` included
    pub fn fields(&self) -> &IndexMap<Name, Value> {
        &self.fields
    }

    /// Only the values of the given key fields, in key order
    pub fn key_values<S: AsRef<str>>(&self, keys: &[S]) -> IndexMap<Name, Value> {
        keys.iter()
            .filter_map(|key| {
                let name = Name::new(key.as_ref());
                self.fields.get(&name).map(|value| (name, value.clone()))
            })
            .collect()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// The annotated SDL served by `_service { sdl }`
///
/// Computed once per transformed schema and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor(Arc<str>);

impl ServiceDescriptor {
    pub fn new(sdl: impl Into<Arc<str>>) -> Self {
        Self(sdl.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (Name::new(k), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_representation_from_value() {
        let repr = Representation::from_value(object(&[
            ("__typename", Value::String("Product".into())),
            ("id", Value::String("1".into())),
            ("sku", Value::String("abc".into())),
        ]))
        .unwrap();

        assert_eq!(repr.typename(), "Product");
        assert_eq!(repr.get("id"), Some(&Value::String("1".into())));

        let keys = repr.key_values(&["id"]);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key(&Name::new("id")));
    }

    #[test]
    fn test_representation_requires_typename() {
        let err = Representation::from_value(object(&[("id", Value::String("1".into()))]))
            .unwrap_err();
        assert!(matches!(err, EntityError::MissingTypename));

        let err = Representation::from_value(object(&[("__typename", Value::Number(1.into()))]))
            .unwrap_err();
        assert!(matches!(err, EntityError::MissingTypename));
    }

    #[test]
    fn test_representation_must_be_object() {
        let err = Representation::from_value(Value::String("Product".into())).unwrap_err();
        assert!(matches!(err, EntityError::InvalidRepresentation));
    }

    #[test]
    fn test_service_descriptor_display() {
        let descriptor = ServiceDescriptor::new("type A {\n  id: ID\n}\n");
        assert_eq!(descriptor.to_string(), descriptor.as_str());
    }
}
