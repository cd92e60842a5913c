//! Schema augmentation: the federation root fields and their types
//!
//! Adds, without touching anything else in the schema:
//!
//! - `scalar _Any`
//! - `type _Service { sdl: String }`
//! - `union _Entity = <entities>` (only when there are entities)
//! - `_service: _Service!` and `_entities(representations: [_Any!]!): [_Entity]!`
//!   on the query root, which is created when missing

use std::sync::Arc;

use apollo_compiler::ast::{
    Definition, DirectiveList, Document, FieldDefinition, InputValueDefinition,
    ObjectTypeDefinition, ScalarTypeDefinition, Type, UnionTypeDefinition,
};
use apollo_compiler::{name, Name, Node};
use async_graphql::Value;
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::classify::TypeClassification;
use crate::entities::EntityReferenceResolver;
use crate::executable::{query_type_name, type_name, ExecutableSchema, FieldResolver, ResolveInfo};
use crate::types::ServiceDescriptor;
use crate::{FederationError, Result};

pub const ANY_SCALAR: &str = "_Any";
pub const SERVICE_TYPE: &str = "_Service";
pub const ENTITY_UNION: &str = "_Entity";
pub const SERVICE_FIELD: &str = "_service";
pub const ENTITIES_FIELD: &str = "_entities";

/// `_service` resolves to an empty object; its `sdl` field does the work
struct ServiceField;

#[async_trait]
impl FieldResolver for ServiceField {
    async fn resolve(&self, _info: &ResolveInfo<'_>) -> async_graphql::Result<Value> {
        Ok(Value::Object(IndexMap::new()))
    }
}

/// `_Service.sdl` serves the SDL computed at transform time
struct SdlField {
    descriptor: ServiceDescriptor,
}

#[async_trait]
impl FieldResolver for SdlField {
    async fn resolve(&self, _info: &ResolveInfo<'_>) -> async_graphql::Result<Value> {
        Ok(Value::String(self.descriptor.as_str().to_string()))
    }
}

/// Add the federation types, root fields and their resolvers
pub fn augment_schema(
    schema: ExecutableSchema,
    classification: Arc<TypeClassification>,
    descriptor: ServiceDescriptor,
) -> Result<ExecutableSchema> {
    let (mut document, mut resolvers) = schema.into_parts();
    let query = query_type_name(&document);
    let has_entities = classification.has_entities();

    let mut synthesized = vec![
        Definition::ScalarTypeDefinition(Node::new(ScalarTypeDefinition {
            description: None,
            name: name!("_Any"),
            directives: DirectiveList::new(),
        })),
        object_type(
            name!("_Service"),
            vec![field(name!("sdl"), Type::Named(name!("String")), Vec::new())],
        ),
    ];
    let mut root_fields = vec![field(
        name!("_service"),
        Type::NonNullNamed(name!("_Service")),
        Vec::new(),
    )];

    if has_entities {
        synthesized.push(Definition::UnionTypeDefinition(Node::new(UnionTypeDefinition {
            description: None,
            name: name!("_Entity"),
            directives: DirectiveList::new(),
            members: classification
                .entities()
                .map(|entity| entity.name.clone())
                .collect(),
        })));
        root_fields.push(field(
            name!("_entities"),
            Type::NonNullList(Box::new(Type::Named(name!("_Entity")))),
            vec![Node::new(InputValueDefinition {
                description: None,
                name: name!("representations"),
                ty: Node::new(Type::NonNullList(Box::new(Type::NonNullNamed(name!("_Any"))))),
                default_value: None,
                directives: DirectiveList::new(),
            })],
        ));
    }

    let synthesized_names: Vec<Name> = synthesized
        .iter()
        .filter_map(type_name)
        .cloned()
        .collect();
    document.definitions.retain(|definition| {
        type_name(definition).map_or(true, |name| !synthesized_names.contains(name))
    });

    merge_root_fields(&mut document, &query, root_fields)?;
    document.definitions.extend(synthesized);

    resolvers.insert(query.as_str(), SERVICE_FIELD, Arc::new(ServiceField));
    resolvers.insert(SERVICE_TYPE, "sdl", Arc::new(SdlField { descriptor }));
    if has_entities {
        resolvers.insert(
            query.as_str(),
            ENTITIES_FIELD,
            Arc::new(EntityReferenceResolver::new(classification.clone())),
        );
    }

    tracing::debug!(
        query = %query,
        entities = ?classification.entities().map(|entity| entity.name.as_str()).collect::<Vec<_>>(),
        "added federation fields to query root"
    );

    Ok(ExecutableSchema::from_parts(document, resolvers))
}

/// Append fields to the query root, replacing same-named ones
fn merge_root_fields(
    document: &mut Document,
    query: &Name,
    fields: Vec<Node<FieldDefinition>>,
) -> Result<()> {
    let root = document
        .definitions
        .iter_mut()
        .find(|definition| type_name(definition) == Some(query));

    let Some(root) = root else {
        document
            .definitions
            .push(object_type(query.clone(), fields));
        return Ok(());
    };

    let Definition::ObjectTypeDefinition(object) = root else {
        return Err(FederationError::Schema(format!(
            "query root type \"{query}\" is not an object type"
        )));
    };

    let object = object.make_mut();
    object
        .fields
        .retain(|existing| !fields.iter().any(|field| field.name == existing.name));
    object.fields.extend(fields);
    Ok(())
}

fn object_type(name: Name, fields: Vec<Node<FieldDefinition>>) -> Definition {
    Definition::ObjectTypeDefinition(Node::new(ObjectTypeDefinition {
        description: None,
        name,
        implements_interfaces: Vec::new(),
        directives: DirectiveList::new(),
        fields,
    }))
}

fn field(name: Name, ty: Type, arguments: Vec<Node<InputValueDefinition>>) -> Node<FieldDefinition> {
    Node::new(FieldDefinition {
        description: None,
        name,
        arguments,
        ty,
        directives: DirectiveList::new(),
    })
}
