//! The federation transform

use std::sync::Arc;

use crate::augment::augment_schema;
use crate::classify::classify_types;
use crate::config::FederationConfig;
use crate::executable::ExecutableSchema;
use crate::sdl::federation_sdl;
use crate::types::ServiceDescriptor;
use crate::Result;

/// Turn an executable schema into a federation subgraph schema
///
/// Validates `config` against the schema, computes the annotated SDL once,
/// and adds `_service` / `_entities` with their supporting types. Existing
/// types, fields and resolvers are carried over unchanged.
///
/// Configuration errors (for example a reference resolver on a scalar) are
/// returned here, before any schema is produced.
///
/// # Example
///
/// ```rust,no_run
/// use futures::FutureExt;
/// use graphql_transform_federation::{
///     reference_fn, transform_schema_federation, ExecutableSchema, FederationConfig,
///     FederationObjectConfig,
/// };
///
/// # fn example() -> graphql_transform_federation::Result<()> {
/// let schema = ExecutableSchema::new("type Product { id: ID! name: String! }")?;
/// let config = FederationConfig::new().with_type(
///     "Product",
///     FederationObjectConfig::new()
///         .key(["id"])
///         .extend(true)
///         .resolve_reference(reference_fn(|reference, _info| {
///             async move { Ok(reference.into_value()) }.boxed()
///         })),
/// );
///
/// let subgraph = transform_schema_federation(schema, config)?.finish()?;
/// # let _ = subgraph;
/// # Ok(())
/// # }
/// ```
pub fn transform_schema_federation(
    schema: ExecutableSchema,
    config: FederationConfig,
) -> Result<ExecutableSchema> {
    let classification = Arc::new(classify_types(schema.document(), &config)?);

    let descriptor = ServiceDescriptor::new(federation_sdl(schema.document(), &classification));
    tracing::debug!(
        sdl_bytes = descriptor.as_str().len(),
        "computed federation service sdl"
    );

    augment_schema(schema, classification, descriptor)
}
