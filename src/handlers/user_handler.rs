//! User, branch and summary queries

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Branch, DomainError, FinancialSummary, OperationContext, User};
use crate::error::AppError;
use crate::ledger::BankStore;

pub struct UserHandler {
    store: Arc<dyn BankStore>,
}

impl UserHandler {
    pub fn new(store: Arc<dyn BankStore>) -> Self {
        Self { store }
    }

    /// The authenticated user's record
    pub async fn current(&self, context: &OperationContext) -> Result<User, AppError> {
        self.store
            .find_user(context.user_id())
            .await?
            .ok_or_else(|| DomainError::not_found("User", context.user_id()).into())
    }

    pub async fn branches(&self) -> Result<Vec<Branch>, AppError> {
        self.store.list_branches().await
    }

    pub async fn branch_employees(&self, branch_id: Uuid) -> Result<Vec<User>, AppError> {
        if self.store.find_branch(branch_id).await?.is_none() {
            return Err(DomainError::not_found("Branch", branch_id).into());
        }
        self.store.list_branch_employees(branch_id).await
    }

    /// Balances, active loans, recent transfers and payments of the caller
    pub async fn summary(&self, context: &OperationContext) -> Result<FinancialSummary, AppError> {
        self.store
            .summary(context.user_id(), context.received_at)
            .await
    }
}
