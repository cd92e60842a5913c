//! `_entities` resolution
//!
//! Each representation is resolved independently: representations are
//! dispatched by `__typename` to the entity's reference resolver (or echoed
//! back when it has none), all of them are polled concurrently, and every
//! failure stays in its own slot.

use std::sync::Arc;

use async_graphql::{Name, PathSegment, ServerError, Value};
use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

use crate::classify::TypeClassification;
use crate::executable::{FieldResolver, ResolveInfo};
use crate::types::{Representation, TYPENAME};

/// Why a single representation could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("Representation must be an object")]
    InvalidRepresentation,

    #[error("Representation is missing a \"__typename\" string")]
    MissingTypename,

    #[error("Type \"{0}\" is not defined in the schema")]
    UnknownType(String),

    #[error("Type \"{0}\" is not an entity")]
    NotAnEntity(String),

    #[error("Reference resolver for \"{0}\" returned a value that is not an object")]
    InvalidResult(String),

    #[error("{0}")]
    Resolver(String),
}

/// Outcome of one representation, aligned with its input position
pub type EntityResult = Result<Value, EntityError>;

/// Dispatches representations to reference resolvers
///
/// Also serves as the resolver of the `_entities` field.
#[derive(Debug, Clone)]
pub struct EntityReferenceResolver {
    classification: Arc<TypeClassification>,
}

impl EntityReferenceResolver {
    pub fn new(classification: Arc<TypeClassification>) -> Self {
        Self { classification }
    }

    /// Resolve every representation concurrently, preserving input order
    pub async fn resolve_representations(
        &self,
        representations: Vec<Value>,
        info: &ResolveInfo<'_>,
    ) -> Vec<EntityResult> {
        join_all(
            representations
                .into_iter()
                .enumerate()
                .map(|(index, representation)| self.resolve_one(index, representation, info)),
        )
        .await
    }

    async fn resolve_one(
        &self,
        index: usize,
        representation: Value,
        info: &ResolveInfo<'_>,
    ) -> EntityResult {
        let representation = Representation::from_value(representation)?;
        let entity = self.classification.entity(representation.typename())?;
        let typename = entity.name.to_string();

        tracing::trace!(index, typename = %typename, "resolving entity representation");

        let resolved = match &entity.config.resolve_reference {
            Some(resolver) => resolver
                .resolve_reference(representation, info)
                .await
                .map_err(|e| EntityError::Resolver(e.message))?,
            None => representation.into_value(),
        };

        tag_entity(resolved, &typename)
    }
}

#[async_trait]
impl FieldResolver for EntityReferenceResolver {
    async fn resolve(&self, info: &ResolveInfo<'_>) -> async_graphql::Result<Value> {
        // A lone object is accepted as a one-item list, as input coercion allows.
        let representations = match info.arg("representations") {
            Some(Value::List(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        let results = self.resolve_representations(representations, info).await;
        let entities = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(entity) => entity,
                Err(error) => {
                    tracing::warn!(index, error = %error, "failed to resolve entity representation");
                    report_error(info, index, &error);
                    Value::Null
                }
            })
            .collect();

        Ok(Value::List(entities))
    }
}

/// Make sure a resolved entity carries its `__typename`
fn tag_entity(value: Value, typename: &str) -> EntityResult {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Object(mut fields) => {
            fields
                .entry(Name::new(TYPENAME))
                .or_insert_with(|| Value::String(typename.to_string()));
            Ok(Value::Object(fields))
        }
        _ => Err(EntityError::InvalidResult(typename.to_string())),
    }
}

/// Record a per-item error at `[..., "_entities", index]`
fn report_error(info: &ResolveInfo<'_>, index: usize, error: &EntityError) {
    let mut server_error = info
        .ctx
        .set_error_path(ServerError::new(error.to_string(), Some(info.ctx.item.pos)));
    server_error.path.push(PathSegment::Index(index));
    info.ctx.add_error(server_error);
}
