//! Storage port
//!
//! [`BankStore`] is the single seam between the HTTP/handler layer and
//! persistence. Every method that moves money is one atomic unit: it locks the
//! rows it touches, applies the domain rules and either commits everything or
//! nothing.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Branch, Card, CardDraft, FinancialSummary, Loan, LoanAction, Payment,
    PaymentOrder, Principal, Transfer, TransferOrder, User,
};
use crate::error::AppResult;
use crate::identifiers::IdentifierGenerator;

pub use memory::MemoryBankStore;
pub use postgres::PgBankStore;

/// Which loans a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanScope {
    /// Loans on accounts owned by this user
    Owner(Uuid),
    /// Loans on accounts owned by users of this branch
    Branch(Uuid),
}

impl LoanScope {
    /// Customers see their own loans, employees their branch's
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.branch_id() {
            Some(branch_id) => LoanScope::Branch(branch_id),
            None => LoanScope::Owner(principal.user_id),
        }
    }
}

#[async_trait]
pub trait BankStore: Send + Sync {
    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolve a raw bearer token to its user
    async fn principal_for_token(&self, token: &str) -> AppResult<Option<Principal>>;

    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Look a user up by UUID or, failing that, by username
    async fn find_user_by_username_or_id(&self, key: &str) -> AppResult<Option<User>>;

    /// Persist the address of an existing user
    async fn save_user_address(&self, user: &User) -> AppResult<()>;

    async fn list_branches(&self) -> AppResult<Vec<Branch>>;

    async fn find_branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>>;

    async fn list_branch_employees(&self, branch_id: Uuid) -> AppResult<Vec<User>>;

    // =========================================================================
    // Accounts & cards
    // =========================================================================

    /// Open an account with a freshly generated, unique number
    async fn create_account(
        &self,
        owner_id: Uuid,
        account_type: AccountType,
        ids: &IdentifierGenerator,
    ) -> AppResult<Account>;

    async fn find_account(&self, account_id: Uuid) -> AppResult<Option<Account>>;

    /// Accounts of `owner_id`, oldest first
    async fn list_accounts(&self, owner_id: Uuid) -> AppResult<Vec<Account>>;

    /// Delete an empty, card-less account of `owner_id`. Cards cascade.
    async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> AppResult<()>;

    /// Issue a card on an account of `owner_id`, generating missing identifiers
    async fn create_card(
        &self,
        owner_id: Uuid,
        draft: CardDraft,
        ids: &IdentifierGenerator,
    ) -> AppResult<Card>;

    /// Cards on every account of `user_id`
    async fn list_cards_for_user(&self, user_id: Uuid) -> AppResult<Vec<Card>>;

    async fn delete_card(&self, owner_id: Uuid, card_id: Uuid) -> AppResult<()>;

    // =========================================================================
    // Money movement
    // =========================================================================

    /// Debit origin, credit destination and record the transfer, atomically
    async fn execute_transfer(&self, sender: &Principal, order: TransferOrder)
        -> AppResult<Transfer>;

    /// Transfers sent from accounts of `user_id`, newest first
    async fn list_transfers_sent(&self, user_id: Uuid) -> AppResult<Vec<Transfer>>;

    /// Record a pending loan on an account of `owner_id`
    async fn create_loan(&self, owner_id: Uuid, loan: Loan) -> AppResult<Loan>;

    /// Apply an employee action to a loan, adjusting the balance atomically
    async fn transition_loan(
        &self,
        actor: &Principal,
        loan_id: Uuid,
        action: LoanAction,
    ) -> AppResult<Loan>;

    async fn find_loan(&self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    /// Loans in `scope`, newest first
    async fn list_loans(&self, scope: LoanScope) -> AppResult<Vec<Loan>>;

    /// Debit an account of `owner_id` and record the payment, atomically
    async fn execute_payment(&self, owner_id: Uuid, order: PaymentOrder) -> AppResult<Payment>;

    /// Payments from accounts of `user_id`, newest first
    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>>;

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Read-only summary for `user_id`
    async fn summary(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<FinancialSummary> {
        let accounts = self.list_accounts(user_id).await?;
        let loans = self.list_loans(LoanScope::Owner(user_id)).await?;
        let transfers = self.list_transfers_sent(user_id).await?;
        let payments = self.list_payments(user_id).await?;

        Ok(FinancialSummary::build(
            &accounts, &loans, &transfers, &payments, now,
        ))
    }
}

/// Hex sha256 digest under which bearer tokens are stored
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    #[test]
    fn test_token_digest() {
        let digest = token_digest("secret-token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("secret-token"));
        assert_ne!(digest, token_digest("secret-token2"));
    }

    #[test]
    fn test_loan_scope_for_principal() {
        let user_id = Uuid::new_v4();
        let branch_id = Uuid::new_v4();

        let customer = Principal {
            user_id,
            username: "c".into(),
            role: Role::Customer,
        };
        let clerk = Principal {
            user_id,
            username: "e".into(),
            role: Role::Employee { branch_id },
        };

        assert_eq!(LoanScope::for_principal(&customer), LoanScope::Owner(user_id));
        assert_eq!(LoanScope::for_principal(&clerk), LoanScope::Branch(branch_id));
    }
}
