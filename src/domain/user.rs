//! Users and branches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access::{Principal, Role};
use super::error::DomainError;

/// A bank branch (sucursal). Employees belong to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

impl Branch {
    pub fn new(name: impl Into<String>, address: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            phone,
        }
    }
}

/// A customer or employee of the bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_employee: bool,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New customer, optionally attached to a branch
    pub fn customer(username: impl Into<String>, branch_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            address: None,
            is_employee: false,
            branch_id,
            created_at: Utc::now(),
        }
    }

    /// New employee of `branch_id`
    pub fn employee(username: impl Into<String>, branch_id: Uuid) -> Self {
        Self {
            is_employee: true,
            branch_id: Some(branch_id),
            ..Self::customer(username, None)
        }
    }

    /// Employees must reference a branch
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.username.trim().is_empty() {
            return Err(DomainError::Validation("Username cannot be empty".to_string()));
        }
        if self.is_employee && self.branch_id.is_none() {
            return Err(DomainError::Validation(
                "Employees must belong to a branch".to_string(),
            ));
        }
        Ok(())
    }

    pub fn role(&self) -> Role {
        match (self.is_employee, self.branch_id) {
            (true, Some(branch_id)) => Role::Employee { branch_id },
            _ => Role::Customer,
        }
    }

    /// Replace the postal address
    pub fn change_address(&mut self, address: &str) -> Result<(), DomainError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DomainError::Validation("Address cannot be empty".to_string()));
        }
        if address.chars().count() > 150 {
            return Err(DomainError::Validation(
                "Address cannot be longer than 150 characters".to_string(),
            ));
        }
        self.address = Some(address.to_string());
        Ok(())
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role(),
        }
    }
}
