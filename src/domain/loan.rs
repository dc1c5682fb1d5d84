//! Loan lifecycle
//!
//! ```text
//! pending ──approve──▶ approved ──annul──▶ annulled
//!    │                    │
//!    └──reject──▶ rejected └──settle──▶ paid
//! ```
//!
//! Approval credits the principal to the loan's account and annulment takes it
//! back. Every other transition leaves balances untouched.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::account::Account;
use super::amount::Amount;
use super::error::DomainError;

pub const MIN_DURATION_MONTHS: i32 = 1;
pub const MAX_DURATION_MONTHS: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aprobado")]
    Approved,
    #[serde(rename = "rechazado")]
    Rejected,
    #[serde(rename = "pagado")]
    Paid,
    #[serde(rename = "anulado")]
    Annulled,
}

impl LoanStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Paid => "paid",
            LoanStatus::Annulled => "annulled",
        }
    }

    /// Name exposed to API clients
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pendiente",
            LoanStatus::Approved => "aprobado",
            LoanStatus::Rejected => "rechazado",
            LoanStatus::Paid => "pagado",
            LoanStatus::Annulled => "anulado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Rejected | LoanStatus::Paid | LoanStatus::Annulled
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "pendiente" => Ok(LoanStatus::Pending),
            "approved" | "aprobado" => Ok(LoanStatus::Approved),
            "rejected" | "rechazado" => Ok(LoanStatus::Rejected),
            "paid" | "pagado" => Ok(LoanStatus::Paid),
            "annulled" | "anulado" => Ok(LoanStatus::Annulled),
            other => Err(DomainError::Validation(format!("Unknown loan status: {other}"))),
        }
    }
}

/// Employee actions on an existing loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    Approve,
    Reject,
    Annul,
    Settle,
}

impl LoanAction {
    pub fn verb(&self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Reject => "reject",
            LoanAction::Annul => "annul",
            LoanAction::Settle => "settle",
        }
    }

    /// Status the loan must be in for this action
    pub fn required_status(&self) -> LoanStatus {
        match self {
            LoanAction::Approve | LoanAction::Reject => LoanStatus::Pending,
            LoanAction::Annul | LoanAction::Settle => LoanStatus::Approved,
        }
    }
}

/// Repayment terms computed when the loan is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub total_repayment: Decimal,
    pub monthly_installment: Decimal,
}

impl LoanTerms {
    /// `total = principal + principal * rate / 100`, `installment = total / months`,
    /// both rounded half-to-even to cents.
    pub fn compute(
        principal: &Amount,
        interest_rate: Decimal,
        duration_months: i32,
    ) -> Result<Self, DomainError> {
        validate_interest_rate(interest_rate)?;
        validate_duration(duration_months)?;

        let principal = principal.value();
        let total = (principal + principal * interest_rate / Decimal::ONE_HUNDRED).round_dp(2);
        // must still fit the money column
        let total_repayment = Amount::new(total)?.value();
        let monthly_installment = (total_repayment / Decimal::from(duration_months)).round_dp(2);

        Ok(Self {
            total_repayment,
            monthly_installment,
        })
    }
}

pub fn validate_duration(months: i32) -> Result<(), DomainError> {
    if (MIN_DURATION_MONTHS..=MAX_DURATION_MONTHS).contains(&months) {
        Ok(())
    } else {
        Err(DomainError::InvalidDuration(months))
    }
}

pub fn validate_interest_rate(rate: Decimal) -> Result<(), DomainError> {
    let max = Decimal::new(99_999, 2);
    if rate < Decimal::ZERO || rate > max || rate.normalize().scale() > 2 {
        return Err(DomainError::InvalidInterestRate(rate));
    }
    Ok(())
}

/// A loan attached to one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub account_id: Uuid,
    pub principal: Amount,
    pub interest_rate: Decimal,
    pub total_repayment: Decimal,
    pub monthly_installment: Decimal,
    pub start_date: NaiveDate,
    pub duration_months: i32,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// A new pending loan. Has no balance effect.
    pub fn request(
        account_id: Uuid,
        principal: Amount,
        interest_rate: Decimal,
        duration_months: i32,
        start_date: Option<NaiveDate>,
    ) -> Result<Self, DomainError> {
        let terms = LoanTerms::compute(&principal, interest_rate, duration_months)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            principal,
            interest_rate: interest_rate.round_dp(2),
            total_repayment: terms.total_repayment,
            monthly_installment: terms.monthly_installment,
            start_date: start_date.unwrap_or_else(|| now.date_naive()),
            duration_months,
            status: LoanStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply `action`, adjusting `account` when the action moves money.
    ///
    /// `account` must be the loan's account. On error both the loan and the
    /// account must be discarded by the caller.
    pub fn apply(&mut self, action: LoanAction, account: &mut Account) -> Result<(), DomainError> {
        debug_assert_eq!(account.id, self.account_id);

        let required = action.required_status();
        if self.status != required {
            return Err(DomainError::IllegalStateTransition {
                action: action.verb(),
                current: self.status.label(),
                required: required.label(),
            });
        }

        match action {
            LoanAction::Approve => {
                account.credit(&self.principal)?;
                self.status = LoanStatus::Approved;
            }
            LoanAction::Reject => {
                self.status = LoanStatus::Rejected;
            }
            LoanAction::Annul => {
                account.debit(&self.principal)?;
                self.status = LoanStatus::Annulled;
            }
            LoanAction::Settle => {
                if self.remaining() < Decimal::ZERO {
                    self.status = LoanStatus::Paid;
                }
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// `total_repayment - monthly_installment * duration_months`
    pub fn remaining(&self) -> Decimal {
        self.total_repayment - self.monthly_installment * Decimal::from(self.duration_months)
    }
}
