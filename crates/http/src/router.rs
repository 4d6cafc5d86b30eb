//! Router builder for the turfbook HTTP server

use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use turfbook_kernel::ModuleRegistry;

use crate::MakeRequestUuid;

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount the merged module routers under `prefix`; an empty prefix mounts at the root
    pub fn mount_api(mut self, prefix: &str, api: Router) -> Self {
        let prefix = normalize_prefix(prefix);
        self.router = if prefix.is_empty() {
            self.router.merge(api)
        } else {
            self.router.nest(&prefix, api)
        };
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Add request ID middleware; the id is echoed back on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Serve the merged OpenAPI document as JSON and through Swagger UI
    pub fn with_openapi(mut self, registry: &ModuleRegistry, prefix: &str) -> Self {
        let document = openapi_document(registry, prefix);

        // Swagger UI needs a typed utoipa document
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(document.clone())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "merged OpenAPI document rejected, serving a bare one");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Turfbook API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        // Raw JSON for clients that skip the UI
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(document.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge the OpenAPI fragments of every module into one document.
///
/// Module paths are prefixed with the API prefix.
pub fn openapi_document(registry: &ModuleRegistry, prefix: &str) -> serde_json::Value {
    let prefix = normalize_prefix(prefix);
    let mut document = serde_json::json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Turfbook API",
            "version": "1.0.0",
            "description": "Turf search, slot booking and contact API"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    // Shared error envelope
    document["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string"
                    },
                    "message": {
                        "type": "string"
                    },
                    "details": {
                        "type": "array",
                        "items": {}
                    },
                    "trace_id": {
                        "type": "string"
                    },
                    "timestamp": {
                        "type": "string"
                    }
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["error"]
    });

    document["paths"]["/healthz"] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": {
                        "text/plain": {
                            "schema": {
                                "type": "string"
                            }
                        }
                    }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(fragment) = module.openapi() else {
            continue;
        };

        if let Some(paths) = fragment.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                document["paths"][format!("{}{}", prefix, path)] = path_item.clone();
            }
        }

        if let Some(schemas) = fragment
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                document["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    document
}

/// `"api/"` becomes `"/api"`, `"/"` becomes `""`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use turfbook_kernel::Module;

    struct FixtureModule;

    #[async_trait]
    impl Module for FixtureModule {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn routes(&self) -> Router {
            Router::new().route("/turfs", get(|| async { "turfs" }))
        }

        fn openapi(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({
                "paths": {"/turfs": {"get": {"summary": "List turfs", "responses": {}}}},
                "components": {"schemas": {"Turf": {"type": "object"}}}
            }))
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(FixtureModule));
        registry
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_router_builder_basic() {
        let router = RouterBuilder::new()
            .route("/test", get(|| async { "test" }))
            .build();

        assert_eq!(status_of(router, "/test").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_mounted_at_root_by_default() {
        let api = Router::new().route("/turfs", get(|| async { "turfs" }));
        let router = RouterBuilder::new().mount_api("", api).build();

        assert_eq!(status_of(router, "/turfs").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_mounted_under_prefix() {
        let api = Router::new().route("/turfs", get(|| async { "turfs" }));
        let router = RouterBuilder::new().mount_api("api/", api).build();

        assert_eq!(status_of(router.clone(), "/api/turfs").await, StatusCode::OK);
        assert_eq!(status_of(router, "/turfs").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_middleware_chain_sets_request_id() {
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_tracing()
            .with_cors()
            .with_timeout(5000)
            .with_request_id()
            .build();

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers().get("x-request-id").unwrap();
        assert!(uuid::Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_openapi_document_merges_module_fragments() {
        let doc = openapi_document(&registry(), "/api");

        assert!(doc["paths"]["/api/turfs"]["get"].is_object());
        assert!(doc["paths"]["/healthz"]["get"].is_object());
        assert!(doc["components"]["schemas"]["Turf"].is_object());
        assert!(doc["components"]["schemas"]["ErrorResponse"].is_object());
    }

    #[tokio::test]
    async fn test_openapi_route_serves_document() {
        let router = RouterBuilder::new().with_openapi(&registry(), "").build();
        assert_eq!(status_of(router, "/docs/openapi.json").await, StatusCode::OK);
    }
}
