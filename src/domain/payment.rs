//! Bill payments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::account::Account;
use super::amount::Amount;
use super::error::DomainError;

const MAX_SERVICE_LEN: usize = 30;

/// Payment status. Only `Pending` is set here; the others come from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "pagado")]
    Paid,
    #[serde(rename = "fallido")]
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "pendiente" => Ok(PaymentStatus::Pending),
            "paid" | "pagado" => Ok(PaymentStatus::Paid),
            "failed" | "fallido" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::Validation(format!("Unknown payment status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub service: String,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

/// A validated payment order, not yet executed
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub account_id: Uuid,
    pub service: String,
    pub amount: Amount,
    pub status: PaymentStatus,
}

impl PaymentOrder {
    pub fn new(
        account_id: Uuid,
        service: &str,
        amount: Amount,
        status: Option<PaymentStatus>,
    ) -> Result<Self, DomainError> {
        let service = service.trim();
        if service.is_empty() {
            return Err(DomainError::Validation("Service name cannot be empty".to_string()));
        }
        if service.chars().count() > MAX_SERVICE_LEN {
            return Err(DomainError::Validation(format!(
                "Service name cannot be longer than {MAX_SERVICE_LEN} characters"
            )));
        }

        Ok(Self {
            account_id,
            service: service.to_string(),
            amount,
            status: status.unwrap_or_default(),
        })
    }

    /// Debit the account and produce the payment record
    pub fn execute(self, account: &mut Account) -> Result<Payment, DomainError> {
        account.debit(&self.amount)?;

        Ok(Payment {
            id: Uuid::new_v4(),
            account_id: account.id,
            service: self.service,
            amount: self.amount,
            status: self.status,
            paid_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountType;
    use crate::domain::amount::Balance;
    use crate::domain::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn account(pesos: rust_decimal::Decimal) -> Account {
        let mut account = Account::open(Uuid::new_v4(), AccountType::Savings, "200-00002".into());
        account.balance_pesos = Balance::new(pesos).unwrap();
        account
    }

    #[test]
    fn test_payment_debits_and_defaults_to_pending() {
        let mut acc = account(dec!(300));
        let order =
            PaymentOrder::new(acc.id, "electricity", Amount::new(dec!(120)).unwrap(), None).unwrap();

        let payment = order.execute(&mut acc).unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(acc.balance_pesos.value(), dec!(180));
    }

    #[test]
    fn test_payment_insufficient_funds() {
        let mut acc = account(dec!(10));
        let order = PaymentOrder::new(acc.id, "gas", Amount::new(dec!(11)).unwrap(), None).unwrap();

        let err = order.execute(&mut acc).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(acc.balance_pesos.value(), dec!(10));
    }

    #[test]
    fn test_service_name_rules() {
        let id = Uuid::new_v4();
        let amount = Amount::new(dec!(1)).unwrap();

        assert!(PaymentOrder::new(id, " ", amount, None).is_err());
        assert!(PaymentOrder::new(id, &"x".repeat(31), amount, None).is_err());
        let order = PaymentOrder::new(id, "water", amount, Some(PaymentStatus::Paid)).unwrap();
        assert_eq!(order.status, PaymentStatus::Paid);
    }
}
