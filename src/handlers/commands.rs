//! Command definitions
//!
//! Commands represent intentions to change the system state. They carry raw,
//! unvalidated input; handlers turn them into domain orders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountType, CardProvider, CardType, LoanAction, PaymentStatus};

// =========================================================================
// Accounts & cards
// =========================================================================

/// Command to open an account for the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountCommand {
    pub account_type: AccountType,
}

impl OpenAccountCommand {
    pub fn new(account_type: AccountType) -> Self {
        Self { account_type }
    }
}

/// Command to issue a card on one of the caller's accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCardCommand {
    pub account_id: Uuid,
    pub card_type: CardType,
    pub provider: Option<CardProvider>,
    /// Caller-chosen number; generated when absent
    pub number: Option<String>,
}

impl IssueCardCommand {
    pub fn new(account_id: Uuid, card_type: CardType) -> Self {
        Self {
            account_id,
            card_type,
            provider: None,
            number: None,
        }
    }

    pub fn with_provider(mut self, provider: CardProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_number(mut self, number: String) -> Self {
        self.number = Some(number);
        self
    }
}

// =========================================================================
// Transfers
// =========================================================================

/// Command to move pesos to another account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Account number (`DDD-DDDDD`) or username of the recipient
    pub recipient: String,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Origin account; the caller's oldest account when absent
    pub origin_account_id: Option<Uuid>,
}

impl TransferCommand {
    pub fn new(recipient: impl Into<String>, amount: Decimal) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
            description: None,
            origin_account_id: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn from_account(mut self, account_id: Uuid) -> Self {
        self.origin_account_id = Some(account_id);
        self
    }
}

// =========================================================================
// Loans
// =========================================================================

/// Command to request a loan on one of the caller's accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLoanCommand {
    pub account_id: Uuid,
    pub principal: Decimal,
    /// Percentage, e.g. `10` for 10 %
    pub interest_rate: Decimal,
    pub duration_months: i32,
    pub start_date: Option<NaiveDate>,
}

impl RequestLoanCommand {
    pub fn new(
        account_id: Uuid,
        principal: Decimal,
        interest_rate: Decimal,
        duration_months: i32,
    ) -> Self {
        Self {
            account_id,
            principal,
            interest_rate,
            duration_months,
            start_date: None,
        }
    }

    pub fn starting(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }
}

/// Command for an employee action on a loan
#[derive(Debug, Clone, Copy)]
pub struct LoanTransitionCommand {
    pub loan_id: Uuid,
    pub action: LoanAction,
}

impl LoanTransitionCommand {
    pub fn new(loan_id: Uuid, action: LoanAction) -> Self {
        Self { loan_id, action }
    }
}

/// Which loans a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoanFilter {
    #[default]
    All,
    Active,
    Paid,
}

// =========================================================================
// Payments
// =========================================================================

/// Command to pay a service bill from one of the caller's accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayBillCommand {
    pub account_id: Uuid,
    pub service: String,
    pub amount: Decimal,
    pub status: Option<PaymentStatus>,
}

impl PayBillCommand {
    pub fn new(account_id: Uuid, service: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_id,
            service: service.into(),
            amount,
            status: None,
        }
    }
}

// =========================================================================
// Users
// =========================================================================

/// Command for an employee to change a customer's address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAddressCommand {
    pub username_or_id: String,
    pub address: String,
}

impl UpdateAddressCommand {
    pub fn new(username_or_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            username_or_id: username_or_id.into(),
            address: address.into(),
        }
    }
}
