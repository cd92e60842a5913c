//! # graphql-transform-federation
//!
//! Turns a plain executable GraphQL schema into an Apollo Federation (v1)
//! subgraph.
//!
//! ## Features
//!
//! - **Executable Schema** - SDL type definitions plus a resolver map, lowered
//!   to an `async_graphql::dynamic::Schema`
//! - **Type Classification** - entity detection and config validation
//! - **SDL Injection** - `@key` / `@extends` spliced into the printed schema
//! - **Schema Augmentation** - `_service`, `_entities`, `_Any`, `_Entity`
//! - **Entity Resolution** - concurrent `_entities` dispatch with per-item errors
//! - **HTTP Handler** - axum endpoint for serving the subgraph
//!
//! ## Usage
//!
//! ```rust,no_run
//! use graphql_transform_federation::{
//!     transform_schema_federation, ExecutableSchema, FederationConfig, FederationObjectConfig,
//! };
//!
//! # fn example() -> graphql_transform_federation::Result<()> {
//! let schema = ExecutableSchema::new("type Product { id: ID! }")?;
//! let config = FederationConfig::new()
//!     .with_type("Product", FederationObjectConfig::new().key(["id"]));
//!
//! let federated = transform_schema_federation(schema, config)?.finish()?;
//! # let _ = federated;
//! # Ok(())
//! # }
//! ```

pub mod augment;
pub mod classify;
pub mod config;
pub mod entities;
pub mod executable;
pub mod http;
pub mod sdl;
pub mod transform;
pub mod types;

pub use classify::{classify_types, ClassifiedType, DefinitionKind, TypeClassification};
pub use config::{
    reference_fn, FederationConfig, FederationFieldConfig, FederationObjectConfig,
    ResolveReference,
};
pub use entities::{EntityError, EntityReferenceResolver, EntityResult};
pub use executable::{resolver_fn, ExecutableSchema, FieldResolver, ResolveInfo, ResolverMap};
pub use http::{graphql_handler, router};
pub use transform::transform_schema_federation;
pub use types::{Representation, ServiceDescriptor};

use thiserror::Error;

/// Errors raised while building or transforming a schema
#[derive(Error, Debug)]
pub enum FederationError {
    #[error("Type \"{0}\" is not an object type and can't have a resolveReference function")]
    NotAnObjectType(String),

    #[error("Type \"{0}\" is not an object type and can't have key fields")]
    KeyFieldsOnNonObject(String),

    #[error("Type \"{0}\" is configured for federation but is not defined in the schema")]
    UnknownType(String),

    #[error("Key field \"{field}\" is not defined on type \"{type_name}\"")]
    UnknownKeyField { type_name: String, field: String },

    #[error("Field \"{field}\" is not defined on type \"{type_name}\"")]
    UnknownField { type_name: String, field: String },

    #[error("Invalid type definitions: {0}")]
    Parse(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Invalid federation config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for schema construction and transformation
pub type Result<T> = std::result::Result<T, FederationError>;
