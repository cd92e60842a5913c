//! Axum endpoint for serving a federated subgraph schema
//!
//! Incoming request headers are injected into the request data, so field and
//! reference resolvers can read them through [`ResolveInfo::data_opt`].
//!
//! [`ResolveInfo::data_opt`]: crate::ResolveInfo::data_opt

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Response};
use axum::{extract::Extension, http::HeaderMap, routing::post, Json, Router};

/// Standard GraphQL handler for a subgraph schema
///
/// # Example
///
/// ```rust,no_run
/// use axum::{extract::Extension, routing::post, Router};
/// use graphql_transform_federation::graphql_handler;
///
/// # fn example(schema: async_graphql::dynamic::Schema) {
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler))
///     .layer(Extension(schema));
/// # }
/// ```
pub async fn graphql_handler(
    Extension(schema): Extension<Schema>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response> {
    let request = req.0.data(headers);

    tracing::debug!(operation = ?request.operation_name, "executing subgraph request");

    let response = schema.execute(request).await;

    Json(response)
}

/// Router serving `schema` at `POST /graphql`
pub fn router(schema: Schema) -> Router {
    Router::new()
        .route("/graphql", post(graphql_handler))
        .layer(Extension(schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{reference_fn, FederationConfig, FederationObjectConfig};
    use crate::executable::ExecutableSchema;
    use crate::transform::transform_schema_federation;
    use async_graphql::Value;
    use axum::http::HeaderValue;
    use futures::FutureExt;
    use serde_json::json;

    fn tenant_schema() -> Schema {
        let schema = ExecutableSchema::new("type Product { id: ID! tenant: String }").unwrap();
        let config = FederationConfig::new().with_type(
            "Product",
            FederationObjectConfig::new()
                .key(["id"])
                .resolve_reference(reference_fn(|reference, info| {
                    async move {
                        let tenant = info
                            .data_opt::<HeaderMap>()
                            .and_then(|headers| headers.get("x-tenant"))
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or_default()
                            .to_string();

                        let mut fields = reference.fields().clone();
                        fields.insert(async_graphql::Name::new("tenant"), Value::String(tenant));
                        Ok(Value::Object(fields))
                    }
                    .boxed()
                })),
        );

        transform_schema_federation(schema, config)
            .unwrap()
            .finish()
            .unwrap()
    }

    #[tokio::test]
    async fn test_handler_exposes_headers_to_resolvers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", HeaderValue::from_static("acme"));

        let request = Request::new(
            r#"{ _entities(representations: [{ __typename: "Product", id: "7" }]) { ... on Product { id tenant } } }"#,
        );
        let Json(response) =
            graphql_handler(Extension(tenant_schema()), headers, Json(request)).await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "_entities": [{ "id": "7", "tenant": "acme" }] })
        );
    }

    #[test]
    fn test_router_builds() {
        let _router = router(tenant_schema());
    }
}
