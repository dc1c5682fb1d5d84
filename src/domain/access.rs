//! Access policy
//!
//! Roles are a closed set. Capabilities are pure functions over the caller's
//! role, the resource owner and the owner's branch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    Customer,
    Employee { branch_id: Uuid },
}

/// Authenticated caller, resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_employee(&self) -> bool {
        matches!(self.role, Role::Employee { .. })
    }

    pub fn branch_id(&self) -> Option<Uuid> {
        match self.role {
            Role::Employee { branch_id } => Some(branch_id),
            Role::Customer => None,
        }
    }
}

/// The caller owns the resource
pub fn owns_account(principal: &Principal, owner_id: Uuid) -> bool {
    principal.user_id == owner_id
}

/// An employee of the same branch as the resource owner
pub fn can_supervise(principal: &Principal, owner_branch: Option<Uuid>) -> bool {
    match (principal.role, owner_branch) {
        (Role::Employee { branch_id }, Some(owner_branch)) => branch_id == owner_branch,
        _ => false,
    }
}

/// Fail unless the caller owns the account
pub fn ensure_owner(
    principal: &Principal,
    account_id: Uuid,
    owner_id: Uuid,
) -> Result<(), DomainError> {
    if owns_account(principal, owner_id) {
        Ok(())
    } else {
        Err(DomainError::AccountNotOwned(account_id))
    }
}

/// Fail unless the caller is an employee; returns the employee's branch
pub fn require_employee(principal: &Principal) -> Result<Uuid, DomainError> {
    principal.branch_id().ok_or_else(|| {
        DomainError::PermissionDenied("this operation is reserved to employees".to_string())
    })
}

/// Fail unless the caller is an employee of `owner_branch`
pub fn ensure_supervisor(
    principal: &Principal,
    owner_branch: Option<Uuid>,
) -> Result<(), DomainError> {
    require_employee(principal)?;
    if can_supervise(principal, owner_branch) {
        Ok(())
    } else {
        Err(DomainError::PermissionDenied(
            "the customer belongs to another branch".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    fn customer() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "cliente".to_string(),
            role: Role::Customer,
        }
    }

    fn employee(branch_id: Uuid) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "empleado".to_string(),
            role: Role::Employee { branch_id },
        }
    }

    #[test]
    fn test_owner_check() {
        let caller = customer();
        assert!(owns_account(&caller, caller.user_id));
        assert!(!owns_account(&caller, Uuid::new_v4()));
        assert!(ensure_owner(&caller, Uuid::new_v4(), caller.user_id).is_ok());

        let err = ensure_owner(&caller, Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_customer_cannot_supervise() {
        let branch = Uuid::new_v4();
        assert!(!can_supervise(&customer(), Some(branch)));
        assert!(require_employee(&customer()).is_err());
    }

    #[test]
    fn test_employee_supervises_only_own_branch() {
        let branch = Uuid::new_v4();
        let clerk = employee(branch);

        assert!(can_supervise(&clerk, Some(branch)));
        assert!(!can_supervise(&clerk, Some(Uuid::new_v4())));
        assert!(!can_supervise(&clerk, None));
        assert_eq!(require_employee(&clerk).unwrap(), branch);
        assert!(ensure_supervisor(&clerk, Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_value(Role::Customer).unwrap();
        assert_eq!(json["role"], "customer");
    }
}
