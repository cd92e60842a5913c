//! Type classification: which configured types are entities
//!
//! Runs once per transform. Every configured type is looked up in the schema
//! and validated eagerly, so a misconfigured schema is rejected before it is
//! ever served.

use std::collections::{HashMap, HashSet};

use apollo_compiler::ast::{Definition, Document};
use apollo_compiler::Name;
use indexmap::IndexMap;

use crate::config::{FederationConfig, FederationObjectConfig};
use crate::entities::EntityError;
use crate::executable::{type_definitions, type_name};
use crate::{FederationError, Result};

/// The kind of a named type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl DefinitionKind {
    fn of(definition: &Definition) -> Option<Self> {
        match definition {
            Definition::ScalarTypeDefinition(_) => Some(Self::Scalar),
            Definition::ObjectTypeDefinition(_) => Some(Self::Object),
            Definition::InterfaceTypeDefinition(_) => Some(Self::Interface),
            Definition::UnionTypeDefinition(_) => Some(Self::Union),
            Definition::EnumTypeDefinition(_) => Some(Self::Enum),
            Definition::InputObjectTypeDefinition(_) => Some(Self::InputObject),
            _ => None,
        }
    }
}

/// A configured type together with what the schema says about it
#[derive(Debug, Clone)]
pub struct ClassifiedType {
    pub name: Name,
    pub kind: DefinitionKind,
    pub config: FederationObjectConfig,
}

impl ClassifiedType {
    /// Keyed object types are entities and members of `_Entity`
    pub fn is_entity(&self) -> bool {
        self.kind == DefinitionKind::Object && self.config.has_keys()
    }
}

/// Result of classifying a schema against its federation config
#[derive(Debug, Clone, Default)]
pub struct TypeClassification {
    configured: IndexMap<String, ClassifiedType>,
    kinds: HashMap<String, DefinitionKind>,
}

impl TypeClassification {
    /// Entity types, in configuration order
    pub fn entities(&self) -> impl Iterator<Item = &ClassifiedType> {
        self.configured.values().filter(|ty| ty.is_entity())
    }

    pub fn has_entities(&self) -> bool {
        self.entities().next().is_some()
    }

    pub fn configured(&self, name: &str) -> Option<&ClassifiedType> {
        self.configured.get(name)
    }

    /// Find the entity a representation targets
    ///
    /// Fails closed: unknown names and types outside `_Entity` are errors.
    pub fn entity(&self, name: &str) -> std::result::Result<&ClassifiedType, EntityError> {
        match self.configured.get(name) {
            Some(ty) if ty.is_entity() => Ok(ty),
            _ if self.kinds.contains_key(name) => Err(EntityError::NotAnEntity(name.to_string())),
            _ => Err(EntityError::UnknownType(name.to_string())),
        }
    }
}

fn field_names(definition: &Definition) -> HashSet<&str> {
    let fields = match definition {
        Definition::ObjectTypeDefinition(object) => &object.fields,
        Definition::InterfaceTypeDefinition(interface) => &interface.fields,
        _ => return HashSet::new(),
    };
    fields.iter().map(|field| field.name.as_str()).collect()
}

/// Classify the configured types of a schema
pub fn classify_types(document: &Document, config: &FederationConfig) -> Result<TypeClassification> {
    let definitions: HashMap<&str, (&Name, &Definition)> = type_definitions(document)
        .filter_map(|definition| {
            type_name(definition).map(|name| (name.as_str(), (name, definition)))
        })
        .collect();

    let mut configured = IndexMap::new();
    for (name, type_config) in config.iter() {
        let (type_name, definition) = definitions
            .get(name)
            .copied()
            .ok_or_else(|| FederationError::UnknownType(name.to_string()))?;
        let kind = DefinitionKind::of(definition)
            .ok_or_else(|| FederationError::UnknownType(name.to_string()))?;

        if kind != DefinitionKind::Object {
            if type_config.resolve_reference.is_some() {
                return Err(FederationError::NotAnObjectType(name.to_string()));
            }
            if type_config.has_keys() {
                return Err(FederationError::KeyFieldsOnNonObject(name.to_string()));
            }
        }

        let fields = field_names(definition);
        if let Some(field) = type_config
            .keys
            .iter()
            .flatten()
            .find(|field| !fields.contains(field.as_str()))
        {
            return Err(FederationError::UnknownKeyField {
                type_name: name.to_string(),
                field: field.clone(),
            });
        }
        if let Some(field) = type_config
            .fields
            .keys()
            .find(|field| !fields.contains(field.as_str()))
        {
            return Err(FederationError::UnknownField {
                type_name: name.to_string(),
                field: field.clone(),
            });
        }

        configured.insert(
            name.to_string(),
            ClassifiedType {
                name: type_name.clone(),
                kind,
                config: type_config.clone(),
            },
        );
    }

    let classification = TypeClassification {
        configured,
        kinds: definitions
            .iter()
            .filter_map(|(name, (_, definition))| {
                DefinitionKind::of(definition).map(|kind| (name.to_string(), kind))
            })
            .collect(),
    };

    tracing::debug!(
        configured = classification.configured.len(),
        entities = classification.entities().count(),
        "classified federation types"
    );

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{reference_fn, FederationFieldConfig};
    use crate::executable::ExecutableSchema;
    use async_graphql::Value;
    use futures::FutureExt;

    fn document(type_defs: &str) -> Document {
        ExecutableSchema::new(type_defs).unwrap().into_parts().0
    }

    fn null_resolver() -> FederationObjectConfig {
        FederationObjectConfig::new().resolve_reference(reference_fn(|_reference, _info| {
            async move { Ok(Value::Null) }.boxed()
        }))
    }

    #[test]
    fn test_entities_are_keyed_object_types() {
        let doc = document(
            r#"
            type Product { id: ID! upc: String }
            type Review { id: ID! }
            type User { id: ID! }
            "#,
        );
        let config = FederationConfig::new()
            .with_type("User", FederationObjectConfig::new().key(["id"]))
            .with_type("Review", null_resolver())
            .with_type("Product", FederationObjectConfig::new().key(["upc"]).extend(true));

        let classification = classify_types(&doc, &config).unwrap();
        let entities: Vec<&str> = classification
            .entities()
            .map(|ty| ty.name.as_str())
            .collect();
        assert_eq!(entities, ["User", "Product"]);
        assert!(classification.configured("Review").is_some());
        assert!(!classification.configured("Review").unwrap().is_entity());
    }

    #[test]
    fn test_resolve_reference_on_scalar_is_rejected() {
        let doc = document("scalar MockScalar");
        let config = FederationConfig::new().with_type("MockScalar", null_resolver());

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(err, FederationError::NotAnObjectType(ref name) if name == "MockScalar"));
        assert_eq!(
            err.to_string(),
            "Type \"MockScalar\" is not an object type and can't have a resolveReference function"
        );
    }

    #[test]
    fn test_resolve_reference_on_interface_is_rejected() {
        let doc = document("interface Node { id: ID! }");
        let config = FederationConfig::new().with_type("Node", null_resolver());

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(err, FederationError::NotAnObjectType(_)));
    }

    #[test]
    fn test_keys_on_enum_are_rejected() {
        let doc = document("enum Color { RED }");
        let config =
            FederationConfig::new().with_type("Color", FederationObjectConfig::new().key(["RED"]));

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(err, FederationError::KeyFieldsOnNonObject(_)));
    }

    #[test]
    fn test_unknown_configured_type_is_rejected() {
        let doc = document("type Product { id: ID! }");
        let config =
            FederationConfig::new().with_type("Missing", FederationObjectConfig::new().key(["id"]));

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(err, FederationError::UnknownType(ref name) if name == "Missing"));
    }

    #[test]
    fn test_unknown_key_field_is_rejected() {
        let doc = document("type Product { id: ID! }");
        let config = FederationConfig::new()
            .with_type("Product", FederationObjectConfig::new().key(["id", "sku"]));

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(
            err,
            FederationError::UnknownKeyField { ref type_name, ref field }
                if type_name == "Product" && field == "sku"
        ));
    }

    #[test]
    fn test_unknown_directive_field_is_rejected() {
        let doc = document("type Review { id: ID! }");
        let config = FederationConfig::new().with_type(
            "Review",
            FederationObjectConfig::new().field("author", FederationFieldConfig::external()),
        );

        let err = classify_types(&doc, &config).unwrap_err();
        assert!(matches!(err, FederationError::UnknownField { ref field, .. } if field == "author"));
    }

    #[test]
    fn test_entity_lookup_fails_closed() {
        let doc = document(
            r#"
            type Product { id: ID! }
            type Review { id: ID! }
            "#,
        );
        let config = FederationConfig::new()
            .with_type("Product", FederationObjectConfig::new().key(["id"]));
        let classification = classify_types(&doc, &config).unwrap();

        assert!(classification.entity("Product").is_ok());
        assert!(matches!(
            classification.entity("Review"),
            Err(EntityError::NotAnEntity(_))
        ));
        assert!(matches!(
            classification.entity("Nope"),
            Err(EntityError::UnknownType(_))
        ));
        assert_eq!(
            classification.configured("Product").map(|ty| ty.kind),
            Some(DefinitionKind::Object)
        );
    }
}
