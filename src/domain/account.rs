//! Account ledger
//!
//! An account holds two balances: pesos (the primary currency, the only one
//! money movement touches) and dollars. Balances never go negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::amount::{Amount, Balance};
use super::error::DomainError;

/// Account type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "ahorro", alias = "savings")]
    Savings,
    #[serde(rename = "corriente", alias = "checking")]
    Checking,
}

impl AccountType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "savings" | "ahorro" => Ok(AccountType::Savings),
            "checking" | "corriente" => Ok(AccountType::Checking),
            other => Err(DomainError::Validation(format!("Unknown account type: {other}"))),
        }
    }
}

/// A customer account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// `DDD-DDDDD`, generated and unique
    pub number: String,
    pub owner_id: Uuid,
    pub account_type: AccountType,
    pub balance_pesos: Balance,
    pub balance_dolares: Balance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open an account with zero balances
    pub fn open(owner_id: Uuid, account_type: AccountType, number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            owner_id,
            account_type,
            balance_pesos: Balance::zero(),
            balance_dolares: Balance::zero(),
            created_at: Utc::now(),
        }
    }

    /// Withdraw from the peso balance, refusing to go below zero
    pub fn debit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        if !self.balance_pesos.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount.value(),
                self.balance_pesos.value(),
            ));
        }
        self.balance_pesos = self.balance_pesos.debit(amount)?;
        Ok(())
    }

    /// Deposit into the peso balance
    pub fn credit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        self.balance_pesos = self.balance_pesos.credit(amount)?;
        Ok(())
    }

    /// Deletion is only allowed for an empty account without cards
    pub fn ensure_deletable(&self, attached_cards: usize) -> Result<(), DomainError> {
        if !self.balance_pesos.is_zero() || !self.balance_dolares.is_zero() {
            return Err(DomainError::AccountNotEmpty);
        }
        if attached_cards > 0 {
            return Err(DomainError::AccountHasCards);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn funded(pesos: rust_decimal::Decimal) -> Account {
        let mut account = Account::open(Uuid::new_v4(), AccountType::Savings, "123-45678".into());
        account.balance_pesos = Balance::new(pesos).unwrap();
        account
    }

    #[test]
    fn test_debit_and_credit() {
        let mut account = funded(dec!(100));

        account.debit(&Amount::new(dec!(40)).unwrap()).unwrap();
        account.credit(&Amount::new(dec!(15.50)).unwrap()).unwrap();

        assert_eq!(account.balance_pesos.value(), dec!(75.50));
    }

    #[test]
    fn test_debit_insufficient_leaves_balance_untouched() {
        let mut account = funded(dec!(10));

        let err = account.debit(&Amount::new(dec!(10.01)).unwrap()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(account.balance_pesos.value(), dec!(10));
    }

    #[test]
    fn test_deletion_guard() {
        let empty = funded(dec!(0));
        assert!(empty.ensure_deletable(0).is_ok());
        assert_eq!(empty.ensure_deletable(1), Err(DomainError::AccountHasCards));

        assert_eq!(funded(dec!(1)).ensure_deletable(0), Err(DomainError::AccountNotEmpty));

        let mut dollars = funded(dec!(0));
        dollars.balance_dolares = Balance::new(dec!(3)).unwrap();
        assert_eq!(dollars.ensure_deletable(0), Err(DomainError::AccountNotEmpty));
    }

    #[test]
    fn test_account_type_names() {
        let parsed: AccountType = serde_json::from_str("\"corriente\"").unwrap();
        assert_eq!(parsed, AccountType::Checking);
        let alias: AccountType = serde_json::from_str("\"savings\"").unwrap();
        assert_eq!(alias, AccountType::Savings);
        assert_eq!("checking".parse::<AccountType>().unwrap(), AccountType::Checking);
        assert!("gold".parse::<AccountType>().is_err());
    }
}
