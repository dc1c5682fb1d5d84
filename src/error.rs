//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, ErrorKind};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Domain error carried by this error, if any
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Failure category, for callers that branch on it
    pub fn kind(&self) -> Option<ErrorKind> {
        self.domain().map(DomainError::kind)
    }
}

impl From<crate::domain::AmountError> for AppError {
    fn from(err: crate::domain::AmountError) -> Self {
        AppError::Domain(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 401 Unauthorized
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                }
                DomainError::InvalidDuration(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_duration", None)
                }
                DomainError::InvalidInterestRate(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_interest_rate", None)
                }
                DomainError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
                }
                DomainError::InsufficientFunds { .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_funds",
                    Some(domain_err.to_string()),
                ),
                DomainError::AccountNotEmpty => {
                    (StatusCode::BAD_REQUEST, "account_not_empty", None)
                }
                DomainError::AccountHasCards => {
                    (StatusCode::BAD_REQUEST, "account_has_cards", None)
                }
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                }
                DomainError::RecipientNotFound(id) => {
                    (StatusCode::NOT_FOUND, "recipient_not_found", Some(id.clone()))
                }
                DomainError::NotFound { id, .. } => {
                    (StatusCode::NOT_FOUND, "not_found", Some(id.clone()))
                }
                DomainError::AccountNotOwned(id) => {
                    (StatusCode::BAD_REQUEST, "account_not_owned", Some(id.to_string()))
                }
                DomainError::PermissionDenied(msg) => {
                    (StatusCode::FORBIDDEN, "permission_denied", Some(msg.clone()))
                }
                DomainError::IllegalStateTransition { required, .. } => (
                    StatusCode::BAD_REQUEST,
                    "illegal_state_transition",
                    Some(format!("required status: {required}")),
                ),
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let error = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_domain_error_statuses() {
        assert_eq!(
            status_of(DomainError::SameAccountTransfer.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::insufficient_funds(Decimal::ONE, Decimal::ZERO).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::AccountNotOwned(Uuid::nil()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::PermissionDenied("employees only".into()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::not_found("Loan", Uuid::nil()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_and_internal_statuses() {
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_kind_passthrough() {
        let err: AppError = DomainError::AccountHasCards.into();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
        assert_eq!(AppError::Unauthorized.kind(), None);
    }
}
