//! Operation Context
//!
//! Who is calling and under which correlation id. Built once per request by
//! the auth middleware and handed to every command handler.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::access::{Principal, Role};

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Authenticated caller
    pub principal: Principal,

    /// Correlation ID for request tracing
    pub correlation_id: Uuid,

    /// When the request was accepted
    pub received_at: DateTime<Utc>,
}

impl OperationContext {
    /// Create a context for `principal` with a fresh correlation id
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            correlation_id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }

    /// Reuse a correlation id supplied by the client
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.user_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}
