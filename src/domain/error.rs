//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::amount::AmountError;

/// The five client-facing failure categories of the money-movement core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    NotFound,
    PermissionDenied,
    IllegalStateTransition,
}

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero, negative, too precise or over the limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Transfer to same account
    #[error("Origin and destination accounts cannot be the same")]
    SameAccountTransfer,

    /// Loan duration outside 1..=60 months
    #[error("Loan duration must be between 1 and 60 months (got {0})")]
    InvalidDuration(i32),

    /// Interest rate outside the stored range
    #[error("Invalid interest rate: {0}")]
    InvalidInterestRate(Decimal),

    /// Malformed input that is not an amount (recipient, card number, address...)
    #[error("{0}")]
    Validation(String),

    /// Balance too low for a debit
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Account still holds money
    #[error("Cannot delete an account with a non-zero balance")]
    AccountNotEmpty,

    /// Account still has a card attached
    #[error("Cannot delete an account with an attached card")]
    AccountHasCards,

    /// Referenced account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Transfer recipient resolves to no account
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Any other missing record
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the account used in the request
    #[error("Account {0} does not belong to the requesting user")]
    AccountNotOwned(Uuid),

    /// Role or branch mismatch
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Loan status guard failure
    #[error("Cannot {action} loan in status '{current}': it must be '{required}'")]
    IllegalStateTransition {
        action: &'static str,
        current: &'static str,
        required: &'static str,
    },
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Create a not-found error for a named entity
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::SameAccountTransfer
            | Self::InvalidDuration(_)
            | Self::InvalidInterestRate(_)
            | Self::Validation(_)
            | Self::AccountNotEmpty
            | Self::AccountHasCards => ErrorKind::Validation,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::AccountNotFound(_) | Self::RecipientNotFound(_) | Self::NotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::AccountNotOwned(_) | Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::IllegalStateTransition { .. } => ErrorKind::IllegalStateTransition,
        }
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        DomainError::InvalidAmount(err.to_string())
    }
}
