//! Cards
//!
//! Card number, CVV and expiration are assigned once at creation and never
//! change afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::DomainError;

/// Length of a card number
pub const CARD_NUMBER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    #[serde(rename = "debito", alias = "debit")]
    Debit,
    #[serde(rename = "credito", alias = "credit")]
    Credit,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Debit => "debit",
            CardType::Credit => "credit",
        }
    }
}

impl FromStr for CardType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" | "debito" => Ok(CardType::Debit),
            "credit" | "credito" => Ok(CardType::Credit),
            other => Err(DomainError::Validation(format!("Unknown card type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardProvider {
    Visa,
    Mastercard,
}

impl CardProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardProvider::Visa => "visa",
            CardProvider::Mastercard => "mastercard",
        }
    }
}

impl FromStr for CardProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visa" => Ok(CardProvider::Visa),
            "mastercard" => Ok(CardProvider::Mastercard),
            other => Err(DomainError::Validation(format!("Unknown card provider: {other}"))),
        }
    }
}

/// An issued card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub account_id: Uuid,
    pub number: String,
    pub card_type: CardType,
    pub provider: Option<CardProvider>,
    pub cvv: String,
    pub expiration: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Request to issue a card. Identifier fields left empty are generated.
#[derive(Debug, Clone)]
pub struct CardDraft {
    pub account_id: Uuid,
    pub card_type: CardType,
    pub provider: Option<CardProvider>,
    pub number: Option<String>,
    pub cvv: Option<String>,
    pub expiration: Option<NaiveDate>,
}

impl CardDraft {
    pub fn new(account_id: Uuid, card_type: CardType) -> Self {
        Self {
            account_id,
            card_type,
            provider: None,
            number: None,
            cvv: None,
            expiration: None,
        }
    }

    pub fn with_provider(mut self, provider: CardProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    /// Check caller-supplied identifiers. Uniqueness is checked by the store.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(number) = &self.number {
            validate_card_number(number)?;
        }
        if let Some(cvv) = &self.cvv {
            if cvv.len() != 3 || !cvv.chars().all(|c| c.is_ascii_digit()) {
                return Err(DomainError::Validation("CVV must be 3 digits".to_string()));
            }
        }
        Ok(())
    }

    /// Build the card once every identifier is known
    pub fn issue(self, number: String, cvv: String, expiration: NaiveDate) -> Card {
        Card {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            number,
            card_type: self.card_type,
            provider: self.provider,
            cvv,
            expiration,
            created_at: Utc::now(),
        }
    }
}

pub fn validate_card_number(number: &str) -> Result<(), DomainError> {
    if number.len() != CARD_NUMBER_LEN || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::Validation(
            "Card number must be exactly 16 digits".to_string(),
        ));
    }
    Ok(())
}
