//! Update User Handler
//!
//! Lets an employee change the address of a customer of their own branch.

use std::sync::Arc;

use crate::domain::access;
use crate::domain::{DomainError, OperationContext, User};
use crate::error::AppError;
use crate::ledger::BankStore;

use super::UpdateAddressCommand;

pub struct UpdateAddressHandler {
    store: Arc<dyn BankStore>,
}

impl UpdateAddressHandler {
    pub fn new(store: Arc<dyn BankStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        command: UpdateAddressCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        access::require_employee(&context.principal)?;

        let key = command.username_or_id.trim();
        if key.is_empty() {
            return Err(AppError::InvalidRequest(
                "username_or_id is required".to_string(),
            ));
        }

        let mut user = self
            .store
            .find_user_by_username_or_id(key)
            .await?
            .ok_or_else(|| DomainError::not_found("User", key))?;
        access::ensure_supervisor(&context.principal, user.branch_id)?;

        user.change_address(&command.address)?;
        self.store.save_user_address(&user).await?;

        tracing::info!(
            user_id = %user.id,
            employee = %context.user_id(),
            "Address updated"
        );

        Ok(user)
    }
}
