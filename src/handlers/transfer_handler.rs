//! Transfer Handler
//!
//! Moves pesos between accounts with full validation.

use std::sync::Arc;

use crate::domain::{Amount, OperationContext, Recipient, Transfer, TransferOrder};
use crate::error::AppError;
use crate::ledger::BankStore;

use super::TransferCommand;

/// Handler for transfers
pub struct TransferHandler {
    store: Arc<dyn BankStore>,
}

impl TransferHandler {
    pub fn new(store: Arc<dyn BankStore>) -> Self {
        Self { store }
    }

    /// Execute the transfer command
    ///
    /// Amount and recipient are validated before anything is read; the
    /// remaining checks (recipient exists, origin owned, distinct accounts,
    /// funds) run inside the store's atomic unit.
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<Transfer, AppError> {
        let amount = Amount::new(command.amount)?;
        let recipient = Recipient::parse(&command.recipient)?;

        let order = TransferOrder {
            origin: command.origin_account_id,
            recipient,
            amount,
            description: command.description,
        };

        let transfer = self.store.execute_transfer(&context.principal, order).await?;

        tracing::info!(
            transfer_id = %transfer.id,
            origin = %transfer.origin_account_id,
            destination = %transfer.destination_account_id,
            amount = %transfer.amount,
            correlation_id = %context.correlation_id,
            "Transfer completed"
        );

        Ok(transfer)
    }

    /// Transfers sent by the caller, newest first
    pub async fn list(&self, context: &OperationContext) -> Result<Vec<Transfer>, AppError> {
        self.store.list_transfers_sent(context.user_id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_transfer_command() {
        let origin = Uuid::new_v4();
        let cmd = TransferCommand::new("123-45678", dec!(100.00))
            .with_description("Test payment".to_string())
            .from_account(origin);

        assert_eq!(cmd.amount, dec!(100));
        assert_eq!(cmd.description, Some("Test payment".to_string()));
        assert_eq!(cmd.origin_account_id, Some(origin));
    }
}
