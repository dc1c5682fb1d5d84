//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use routes::{create_router, public_router, AppState};

/// Full application: `/health`, public and protected routes under `/api`
pub fn build_router(state: AppState, cors_origin: Option<&str>) -> Router {
    // Layers run last-added first: logging -> auth -> handler
    let protected = create_router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    let api = public_router()
        .merge(protected)
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(correlation_header()))
        .layer(SetRequestIdLayer::new(correlation_header(), MakeRequestUuid))
        .with_state(state)
}

fn correlation_header() -> HeaderName {
    HeaderName::from_static(middleware::CORRELATION_HEADER)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    match origin.and_then(|o| o.parse::<HeaderValue>().ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
