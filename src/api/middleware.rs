//! API Middleware
//!
//! Bearer token authentication and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::request_id::RequestId;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;

use super::routes::AppState;

/// Correlation id header, set on every request and echoed on the response
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id assigned by the request-id layer
pub fn correlation_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
}

// =========================================================================
// Bearer authentication
// =========================================================================

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token to a principal and attach an [`OperationContext`]
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&headers).ok_or_else(|| AppError::Unauthorized.into_response())?;

    let principal = match state.store.principal_for_token(token).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            tracing::debug!("Unknown or expired bearer token");
            return Err(AppError::Unauthorized.into_response());
        }
        Err(err) => return Err(err.into_response()),
    };

    let correlation_id = correlation_id(&request).and_then(|s| Uuid::parse_str(s).ok());

    let mut context = OperationContext::new(principal);
    if let Some(correlation_id) = correlation_id {
        context = context.with_correlation_id(correlation_id);
    }

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = correlation_id(&request).map(str::to_owned);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
