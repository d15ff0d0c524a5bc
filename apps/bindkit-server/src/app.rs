use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware::from_fn_with_state, routing::get, Extension, Json, Router};
use bindkit::api::{binding_boundary, ApiDocs, DefaultProblemFormatter, ProblemFormatter};
use bindkit::{EntityResolver, ReceiverRegistry};
use bindkit_bootstrap::AppConfig;
use catalog::CatalogModule;
use http::{HeaderName, StatusCode};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

const REQUEST_ID_HEADER: &str = "x-request-id";
const API_TITLE: &str = "BindKit API";

/// Build the application router: catalog routes, health, OpenAPI document
/// and the middleware stack.
pub fn build_router(config: &AppConfig) -> Result<Router> {
    let catalog = CatalogModule::default();

    let mut registry = ReceiverRegistry::new();
    catalog.register_receivers(&mut registry);
    tracing::info!(receivers = registry.len(), "Receivers registered");

    let docs = ApiDocs::new();
    let router = catalog
        .register_rest(Router::new(), &docs)
        .context("Failed to register catalog routes")?;

    let openapi = serde_json::to_value(docs.build_openapi(API_TITLE, env!("CARGO_PKG_VERSION")))
        .context("Failed to serialize OpenAPI document")?;
    let openapi = Arc::new(openapi);

    let router = router
        .route("/health", get(health))
        .route(
            "/openapi.json",
            get(move || {
                let doc = openapi.clone();
                async move { Json((*doc).clone()) }
            }),
        );

    let resolver = EntityResolver::new(Arc::new(registry)).with_config(config.binding.clone());
    let formatter: Arc<dyn ProblemFormatter> = Arc::new(DefaultProblemFormatter);

    Ok(apply_middleware(router, resolver, formatter, config.server.timeout_sec))
}

// Outermost to innermost:
// RequestId(Set -> Propagate) -> Trace -> Timeout -> BindingBoundary -> Resolver -> Router
fn apply_middleware(
    mut router: Router,
    resolver: EntityResolver,
    formatter: Arc<dyn ProblemFormatter>,
    timeout_sec: u64,
) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router = router.layer(Extension(resolver));
    router = router.layer(from_fn_with_state(formatter, binding_boundary));

    if timeout_sec > 0 {
        router = router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(timeout_sec),
        ));
    }

    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                let rid = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a");
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    request_id = %rid,
                    status = tracing::field::Empty,
                    latency_ms = tracing::field::Empty,
                )
            })
            .on_response(
                |res: &axum::http::Response<axum::body::Body>,
                 latency: Duration,
                 span: &tracing::Span| {
                    span.record("status", res.status().as_u16());
                    span.record("latency_ms", latency.as_millis() as u64);
                },
            ),
    );

    // Propagate the id to the response, generating one when the client sent none
    router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
    router.layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(router: Router, uri: &str) -> (StatusCode, http::HeaderMap, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_reports_healthy_and_sets_request_id() {
        let router = build_router(&AppConfig::default()).unwrap();
        let (status, headers, body) = call(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn client_request_id_is_propagated() {
        let router = build_router(&AppConfig::default()).unwrap();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[tokio::test]
    async fn openapi_document_lists_catalog_paths() {
        let router = build_router(&AppConfig::default()).unwrap();
        let (status, _, doc) = call(router, "/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["info"]["title"], API_TITLE);
        assert!(doc.pointer("/paths/~1api~1users~1{id}/get").is_some());
        assert!(doc.pointer("/paths/~1api~1pets/post").is_some());
        assert!(doc.pointer("/components/schemas/Problem").is_some());
    }

    #[tokio::test]
    async fn slow_handlers_time_out() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let resolver = EntityResolver::new(Arc::new(ReceiverRegistry::new()));
        let router = apply_middleware(router, resolver, Arc::new(DefaultProblemFormatter), 1);

        let (status, headers, _) = call(router, "/slow").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn binding_errors_pass_through_the_full_stack() {
        let router = build_router(&AppConfig::default()).unwrap();
        let (status, headers, body) = call(router, "/api/users/batch/,").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(headers[http::header::CONTENT_TYPE], "application/problem+json");
        assert_eq!(body["instance"], "/api/users/batch/,");
    }
}
