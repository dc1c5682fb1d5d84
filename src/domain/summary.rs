//! Financial summary of one user, computed from already-loaded records.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use super::account::Account;
use super::loan::{Loan, LoanStatus};
use super::payment::Payment;
use super::transfer::Transfer;

pub const RECENT_TRANSFERS: usize = 5;
pub const RECENT_PAYMENT_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoanTotals {
    /// Sum of total_repayment over approved loans
    pub outstanding: Decimal,
    /// Sum of monthly_installment over approved loans
    pub next_installment: Decimal,
    pub active_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub total_pesos: Decimal,
    pub total_dollars: Decimal,
    pub loans: LoanTotals,
    pub recent_transfers: Vec<Transfer>,
    pub recent_payments: Vec<Payment>,
}

impl FinancialSummary {
    /// `accounts` are the user's accounts. Loans, transfers and payments not
    /// tied to one of them are ignored.
    pub fn build(
        accounts: &[Account],
        loans: &[Loan],
        transfers: &[Transfer],
        payments: &[Payment],
        now: DateTime<Utc>,
    ) -> Self {
        let owned: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();

        let total_pesos = accounts.iter().map(|a| a.balance_pesos.value()).sum();
        let total_dollars = accounts.iter().map(|a| a.balance_dolares.value()).sum();

        let loans = loans
            .iter()
            .filter(|l| owned.contains(&l.account_id) && l.status == LoanStatus::Approved)
            .fold(LoanTotals::default(), |mut totals, loan| {
                totals.outstanding += loan.total_repayment;
                totals.next_installment += loan.monthly_installment;
                totals.active_count += 1;
                totals
            });

        let mut recent_transfers: Vec<Transfer> = transfers
            .iter()
            .filter(|t| owned.contains(&t.origin_account_id))
            .cloned()
            .collect();
        recent_transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_transfers.truncate(RECENT_TRANSFERS);

        let since = now - Duration::days(RECENT_PAYMENT_DAYS);
        let mut recent_payments: Vec<Payment> = payments
            .iter()
            .filter(|p| owned.contains(&p.account_id) && p.paid_at >= since)
            .cloned()
            .collect();
        recent_payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));

        Self {
            total_pesos,
            total_dollars,
            loans,
            recent_transfers,
            recent_payments,
        }
    }
}
