//! Loan Handler
//!
//! Customers request loans; employees of the customer's branch approve,
//! reject, annul and settle them.

use std::sync::Arc;

use crate::domain::{Amount, Loan, LoanStatus, OperationContext};
use crate::error::AppError;
use crate::ledger::{BankStore, LoanScope};

use super::{LoanFilter, LoanTransitionCommand, RequestLoanCommand};

pub struct LoanHandler {
    store: Arc<dyn BankStore>,
}

impl LoanHandler {
    pub fn new(store: Arc<dyn BankStore>) -> Self {
        Self { store }
    }

    /// Record a pending loan. Balances are untouched until approval.
    pub async fn request(
        &self,
        command: RequestLoanCommand,
        context: &OperationContext,
    ) -> Result<Loan, AppError> {
        let principal = Amount::new(command.principal)?;
        let loan = Loan::request(
            command.account_id,
            principal,
            command.interest_rate,
            command.duration_months,
            command.start_date,
        )?;

        let loan = self.store.create_loan(context.user_id(), loan).await?;

        tracing::info!(
            loan_id = %loan.id,
            account_id = %loan.account_id,
            principal = %loan.principal,
            total_repayment = %loan.total_repayment,
            "Loan requested"
        );

        Ok(loan)
    }

    /// Apply an employee action
    pub async fn transition(
        &self,
        command: LoanTransitionCommand,
        context: &OperationContext,
    ) -> Result<Loan, AppError> {
        let loan = self
            .store
            .transition_loan(&context.principal, command.loan_id, command.action)
            .await?;

        tracing::info!(
            loan_id = %loan.id,
            action = command.action.verb(),
            status = %loan.status,
            employee = %context.user_id(),
            correlation_id = %context.correlation_id,
            "Loan transition applied"
        );

        Ok(loan)
    }

    /// Customers see their own loans, employees those of their branch
    pub async fn list(
        &self,
        filter: LoanFilter,
        context: &OperationContext,
    ) -> Result<Vec<Loan>, AppError> {
        let loans = self
            .store
            .list_loans(LoanScope::for_principal(&context.principal))
            .await?;

        let wanted = match filter {
            LoanFilter::All => return Ok(loans),
            LoanFilter::Active => LoanStatus::Approved,
            LoanFilter::Paid => LoanStatus::Paid,
        };
        Ok(loans.into_iter().filter(|l| l.status == wanted).collect())
    }
}
