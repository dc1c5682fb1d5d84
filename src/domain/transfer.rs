//! Transfers
//!
//! A transfer moves pesos from one account to another. The record is written
//! once, with both usernames resolved, and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::amount::Amount;
use super::error::DomainError;

/// Who receives the money
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A `DDD-DDDDD` account number
    AccountNumber(String),
    /// A username; the user's oldest account receives the funds
    Username(String),
}

impl Recipient {
    /// Account numbers contain a dash, usernames do not
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::Validation("Recipient cannot be empty".to_string()));
        }
        if raw.contains('-') {
            Ok(Recipient::AccountNumber(raw.to_string()))
        } else {
            Ok(Recipient::Username(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Recipient::AccountNumber(s) | Recipient::Username(s) => s,
        }
    }
}

/// A validated transfer order, not yet executed
#[derive(Debug, Clone)]
pub struct TransferOrder {
    /// Explicit origin; the sender's oldest account when absent
    pub origin: Option<Uuid>,
    pub recipient: Recipient,
    pub amount: Amount,
    pub description: Option<String>,
}

/// An executed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub origin_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub amount: Amount,
    pub description: Option<String>,
    pub sender_username: String,
    pub receiver_username: String,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Move `amount` from `origin` to `destination` and produce the record.
    ///
    /// Callers must run this inside one atomic unit and discard both accounts
    /// if it fails: on error neither account should be persisted.
    pub fn settle(
        origin: &mut Account,
        destination: &mut Account,
        amount: Amount,
        description: Option<String>,
        sender_username: &str,
        receiver_username: &str,
    ) -> Result<Transfer, DomainError> {
        if origin.id == destination.id {
            return Err(DomainError::SameAccountTransfer);
        }

        origin.debit(&amount)?;
        destination.credit(&amount)?;

        Ok(Transfer {
            id: Uuid::new_v4(),
            origin_account_id: origin.id,
            destination_account_id: destination.id,
            amount,
            description: description.filter(|d| !d.trim().is_empty()),
            sender_username: sender_username.to_string(),
            receiver_username: receiver_username.to_string(),
            created_at: Utc::now(),
        })
    }
}
