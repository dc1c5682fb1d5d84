//! Account and card handlers

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::access;
use crate::domain::{Account, Card, CardDraft, DomainError, OperationContext};
use crate::error::AppError;
use crate::identifiers::IdentifierGenerator;
use crate::ledger::BankStore;

use super::{IssueCardCommand, OpenAccountCommand};

/// Handler for the caller's accounts
pub struct AccountHandler {
    store: Arc<dyn BankStore>,
    ids: Arc<IdentifierGenerator>,
}

impl AccountHandler {
    pub fn new(store: Arc<dyn BankStore>, ids: Arc<IdentifierGenerator>) -> Self {
        Self { store, ids }
    }

    /// Open an account with zero balances and a generated number
    pub async fn open(
        &self,
        command: OpenAccountCommand,
        context: &OperationContext,
    ) -> Result<Account, AppError> {
        let account = self
            .store
            .create_account(context.user_id(), command.account_type, &self.ids)
            .await?;

        tracing::info!(
            account_id = %account.id,
            number = %account.number,
            owner = %account.owner_id,
            "Account opened"
        );

        Ok(account)
    }

    pub async fn list(&self, context: &OperationContext) -> Result<Vec<Account>, AppError> {
        self.store.list_accounts(context.user_id()).await
    }

    /// One of the caller's accounts. Other users' accounts are reported missing.
    pub async fn get(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> Result<Account, AppError> {
        self.store
            .find_account(account_id)
            .await?
            .filter(|account| access::owns_account(&context.principal, account.owner_id))
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }

    /// Delete an empty account with no cards
    pub async fn close(&self, account_id: Uuid, context: &OperationContext) -> Result<(), AppError> {
        self.store.delete_account(context.user_id(), account_id).await?;
        tracing::info!(account_id = %account_id, "Account closed");
        Ok(())
    }
}

/// Handler for cards
pub struct CardHandler {
    store: Arc<dyn BankStore>,
    ids: Arc<IdentifierGenerator>,
}

impl CardHandler {
    pub fn new(store: Arc<dyn BankStore>, ids: Arc<IdentifierGenerator>) -> Self {
        Self { store, ids }
    }

    /// Issue a card; number, CVV and expiration are assigned here once
    pub async fn issue(
        &self,
        command: IssueCardCommand,
        context: &OperationContext,
    ) -> Result<Card, AppError> {
        let mut draft = CardDraft::new(command.account_id, command.card_type);
        if let Some(provider) = command.provider {
            draft = draft.with_provider(provider);
        }
        if let Some(number) = command.number {
            draft = draft.with_number(number);
        }

        let card = self.store.create_card(context.user_id(), draft, &self.ids).await?;

        tracing::info!(card_id = %card.id, account_id = %card.account_id, "Card issued");
        Ok(card)
    }

    pub async fn list(&self, context: &OperationContext) -> Result<Vec<Card>, AppError> {
        self.store.list_cards_for_user(context.user_id()).await
    }

    pub async fn delete(&self, card_id: Uuid, context: &OperationContext) -> Result<(), AppError> {
        self.store.delete_card(context.user_id(), card_id).await
    }

    /// Cards of a customer, looked up by an employee of the customer's branch
    pub async fn for_customer(
        &self,
        customer_id: Uuid,
        context: &OperationContext,
    ) -> Result<Vec<Card>, AppError> {
        access::require_employee(&context.principal)?;

        let customer = self
            .store
            .find_user(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", customer_id))?;
        access::ensure_supervisor(&context.principal, customer.branch_id)?;

        self.store.list_cards_for_user(customer.id).await
    }
}
