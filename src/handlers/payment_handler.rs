//! Bill payment handler

use std::sync::Arc;

use crate::domain::{Amount, OperationContext, Payment, PaymentOrder};
use crate::error::AppError;
use crate::ledger::BankStore;

use super::PayBillCommand;

pub struct PaymentHandler {
    store: Arc<dyn BankStore>,
}

impl PaymentHandler {
    pub fn new(store: Arc<dyn BankStore>) -> Self {
        Self { store }
    }

    /// Debit the account and record the payment
    pub async fn pay(
        &self,
        command: PayBillCommand,
        context: &OperationContext,
    ) -> Result<Payment, AppError> {
        let amount = Amount::new(command.amount)?;
        let order = PaymentOrder::new(command.account_id, &command.service, amount, command.status)?;

        let payment = self.store.execute_payment(context.user_id(), order).await?;

        tracing::info!(
            payment_id = %payment.id,
            account_id = %payment.account_id,
            service = %payment.service,
            amount = %payment.amount,
            "Bill paid"
        );

        Ok(payment)
    }

    pub async fn list(&self, context: &OperationContext) -> Result<Vec<Payment>, AppError> {
        self.store.list_payments(context.user_id()).await
    }
}
