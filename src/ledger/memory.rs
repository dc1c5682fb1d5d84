//! In-memory [`BankStore`]
//!
//! All state sits behind one `tokio::sync::RwLock`. Every mutating unit holds
//! the write guard from its first read to its last write, so concurrent
//! transfers are serialized the same way row locks serialize them in
//! PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{token_digest, BankStore, LoanScope};
use crate::domain::access;
use crate::domain::{
    Account, AccountType, Balance, Branch, Card, CardDraft, DomainError, Loan, LoanAction,
    Payment, PaymentOrder, Principal, Recipient, Transfer, TransferOrder, User,
};
use crate::error::{AppError, AppResult};
use crate::identifiers::{default_expiration, IdentifierFormat, IdentifierGenerator};

#[derive(Debug, Default)]
struct MemoryState {
    branches: HashMap<Uuid, Branch>,
    users: HashMap<Uuid, User>,
    /// token digest -> user id
    tokens: HashMap<String, Uuid>,
    accounts: HashMap<Uuid, Account>,
    cards: HashMap<Uuid, Card>,
    transfers: Vec<Transfer>,
    loans: HashMap<Uuid, Loan>,
    payments: Vec<Payment>,
    account_numbers: HashSet<String>,
    card_numbers: HashSet<String>,
    /// account id -> opening sequence, breaks `created_at` ties
    opened: HashMap<Uuid, u64>,
}

impl MemoryState {
    fn accounts_of(&self, owner_id: Uuid) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .collect();
        accounts.sort_by_key(|a| (a.created_at, self.opened.get(&a.id).copied()));
        accounts
    }

    fn account_ids_of(&self, owner_id: Uuid) -> HashSet<Uuid> {
        self.accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.id)
            .collect()
    }

    fn oldest_account(&self, owner_id: Uuid) -> Option<&Account> {
        self.accounts_of(owner_id).into_iter().next()
    }

    /// Account used by the caller in a request body
    fn owned_account(&self, owner_id: Uuid, account_id: Uuid) -> Result<&Account, DomainError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;
        if account.owner_id != owner_id {
            return Err(DomainError::AccountNotOwned(account_id));
        }
        Ok(account)
    }

    fn resolve_recipient(&self, recipient: &Recipient) -> Result<&Account, DomainError> {
        let found = match recipient {
            Recipient::AccountNumber(number) => {
                self.accounts.values().find(|a| &a.number == number)
            }
            Recipient::Username(username) => self
                .users
                .values()
                .find(|u| &u.username == username)
                .and_then(|u| self.oldest_account(u.id)),
        };
        found.ok_or_else(|| DomainError::RecipientNotFound(recipient.as_str().to_string()))
    }

    fn username(&self, user_id: Uuid) -> Result<String, DomainError> {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .ok_or_else(|| DomainError::not_found("User", user_id))
    }

    fn remove_account(&mut self, account_id: Uuid) {
        if let Some(account) = self.accounts.remove(&account_id) {
            self.account_numbers.remove(&account.number);
        }
        self.opened.remove(&account_id);
        let cards: Vec<Uuid> = self
            .cards
            .values()
            .filter(|c| c.account_id == account_id)
            .map(|c| c.id)
            .collect();
        for card_id in cards {
            if let Some(card) = self.cards.remove(&card_id) {
                self.card_numbers.remove(&card.number);
            }
        }
        self.loans.retain(|_, l| l.account_id != account_id);
        self.payments.retain(|p| p.account_id != account_id);
        self.transfers.retain(|t| {
            t.origin_account_id != account_id && t.destination_account_id != account_id
        });
    }
}

/// Volatile store for tests and local demos
#[derive(Debug, Clone, Default)]
pub struct MemoryBankStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBankStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_branch(&self, branch: Branch) -> AppResult<Branch> {
        let mut state = self.state.write().await;
        if state.branches.values().any(|b| b.name == branch.name) {
            return Err(AppError::InvalidRequest(format!(
                "Branch '{}' already exists",
                branch.name
            )));
        }
        state.branches.insert(branch.id, branch.clone());
        Ok(branch)
    }

    pub async fn insert_user(&self, user: User) -> AppResult<User> {
        user.validate()?;
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(AppError::InvalidRequest(format!(
                "Username '{}' is taken",
                user.username
            )));
        }
        if let Some(branch_id) = user.branch_id {
            if !state.branches.contains_key(&branch_id) {
                return Err(DomainError::not_found("Branch", branch_id).into());
            }
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Register a bearer token for `user_id`. Only the digest is kept.
    pub async fn issue_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(DomainError::not_found("User", user_id).into());
        }
        state.tokens.insert(token_digest(token), user_id);
        Ok(())
    }

    /// Overwrite both balances, bypassing the ledger rules. Seeding only.
    pub async fn set_balances(
        &self,
        account_id: Uuid,
        pesos: Balance,
        dollars: Balance,
    ) -> AppResult<Account> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;
        account.balance_pesos = pesos;
        account.balance_dolares = dollars;
        Ok(account.clone())
    }
}

#[async_trait]
impl BankStore for MemoryBankStore {
    async fn principal_for_token(&self, token: &str) -> AppResult<Option<Principal>> {
        let state = self.state.read().await;
        let principal = state
            .tokens
            .get(&token_digest(token))
            .and_then(|user_id| state.users.get(user_id))
            .map(Principal::from);
        Ok(principal)
    }

    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username_or_id(&self, key: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        if let Ok(id) = key.parse::<Uuid>() {
            if let Some(user) = state.users.get(&id) {
                return Ok(Some(user.clone()));
            }
        }
        Ok(state.users.values().find(|u| u.username == key).cloned())
    }

    async fn save_user_address(&self, user: &User) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| DomainError::not_found("User", user.id))?;
        stored.address = user.address.clone();
        Ok(())
    }

    async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        let state = self.state.read().await;
        let mut branches: Vec<Branch> = state.branches.values().cloned().collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    async fn find_branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        Ok(self.state.read().await.branches.get(&branch_id).cloned())
    }

    async fn list_branch_employees(&self, branch_id: Uuid) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let mut employees: Vec<User> = state
            .users
            .values()
            .filter(|u| u.is_employee && u.branch_id == Some(branch_id))
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(employees)
    }

    async fn create_account(
        &self,
        owner_id: Uuid,
        account_type: AccountType,
        ids: &IdentifierGenerator,
    ) -> AppResult<Account> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&owner_id) {
            return Err(DomainError::not_found("User", owner_id).into());
        }

        let number = ids.next_unique(IdentifierFormat::AccountNumber, |candidate| {
            state.account_numbers.contains(candidate)
        });
        let account = Account::open(owner_id, account_type, number);

        let sequence = state.opened.values().max().map_or(0, |last| last + 1);
        state.opened.insert(account.id, sequence);
        state.account_numbers.insert(account.number.clone());
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&account_id).cloned())
    }

    async fn list_accounts(&self, owner_id: Uuid) -> AppResult<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts_of(owner_id).into_iter().cloned().collect())
    }

    async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get(&account_id)
            .filter(|a| a.owner_id == owner_id)
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

        let attached_cards = state
            .cards
            .values()
            .filter(|c| c.account_id == account_id)
            .count();
        account.ensure_deletable(attached_cards)?;

        state.remove_account(account_id);
        Ok(())
    }

    async fn create_card(
        &self,
        owner_id: Uuid,
        draft: CardDraft,
        ids: &IdentifierGenerator,
    ) -> AppResult<Card> {
        draft.validate()?;
        let mut state = self.state.write().await;
        state.owned_account(owner_id, draft.account_id)?;

        let number = match draft.number.clone() {
            Some(number) if state.card_numbers.contains(&number) => {
                return Err(DomainError::Validation(
                    "Card number already exists".to_string(),
                )
                .into());
            }
            Some(number) => number,
            None => ids.next_unique(IdentifierFormat::CardNumber, |candidate| {
                state.card_numbers.contains(candidate)
            }),
        };
        let cvv = draft.cvv.clone().unwrap_or_else(|| ids.cvv());
        let expiration = draft
            .expiration
            .unwrap_or_else(|| default_expiration(Utc::now().date_naive()));
        let card = draft.issue(number, cvv, expiration);

        state.card_numbers.insert(card.number.clone());
        state.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn list_cards_for_user(&self, user_id: Uuid) -> AppResult<Vec<Card>> {
        let state = self.state.read().await;
        let owned = state.account_ids_of(user_id);
        let mut cards: Vec<Card> = state
            .cards
            .values()
            .filter(|c| owned.contains(&c.account_id))
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn delete_card(&self, owner_id: Uuid, card_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let owned = state.account_ids_of(owner_id);
        let card = state
            .cards
            .get(&card_id)
            .filter(|c| owned.contains(&c.account_id))
            .ok_or_else(|| DomainError::not_found("Card", card_id))?;
        let number = card.number.clone();

        state.cards.remove(&card_id);
        state.card_numbers.remove(&number);
        Ok(())
    }

    async fn execute_transfer(
        &self,
        sender: &Principal,
        order: TransferOrder,
    ) -> AppResult<Transfer> {
        let mut state = self.state.write().await;

        let mut origin = match order.origin {
            Some(account_id) => state
                .accounts
                .get(&account_id)
                .cloned()
                .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?,
            None => state
                .oldest_account(sender.user_id)
                .cloned()
                .ok_or_else(|| {
                    DomainError::Validation("The sender has no account to transfer from".to_string())
                })?,
        };
        let mut destination = state.resolve_recipient(&order.recipient)?.clone();
        access::ensure_owner(sender, origin.id, origin.owner_id)?;

        let sender_username = state.username(origin.owner_id)?;
        let receiver_username = state.username(destination.owner_id)?;

        let transfer = Transfer::settle(
            &mut origin,
            &mut destination,
            order.amount,
            order.description,
            &sender_username,
            &receiver_username,
        )?;

        state.accounts.insert(origin.id, origin);
        state.accounts.insert(destination.id, destination);
        state.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn list_transfers_sent(&self, user_id: Uuid) -> AppResult<Vec<Transfer>> {
        let state = self.state.read().await;
        let owned = state.account_ids_of(user_id);
        let mut transfers: Vec<Transfer> = state
            .transfers
            .iter()
            .filter(|t| owned.contains(&t.origin_account_id))
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transfers)
    }

    async fn create_loan(&self, owner_id: Uuid, loan: Loan) -> AppResult<Loan> {
        let mut state = self.state.write().await;
        state.owned_account(owner_id, loan.account_id)?;
        state.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn transition_loan(
        &self,
        actor: &Principal,
        loan_id: Uuid,
        action: LoanAction,
    ) -> AppResult<Loan> {
        access::require_employee(actor)?;
        let mut state = self.state.write().await;

        let mut loan = state
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Loan", loan_id))?;
        let mut account = state
            .accounts
            .get(&loan.account_id)
            .cloned()
            .ok_or_else(|| DomainError::AccountNotFound(loan.account_id.to_string()))?;
        let owner_branch = state.users.get(&account.owner_id).and_then(|u| u.branch_id);
        access::ensure_supervisor(actor, owner_branch)?;

        loan.apply(action, &mut account)?;

        state.accounts.insert(account.id, account);
        state.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn find_loan(&self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        Ok(self.state.read().await.loans.get(&loan_id).cloned())
    }

    async fn list_loans(&self, scope: LoanScope) -> AppResult<Vec<Loan>> {
        let state = self.state.read().await;
        let accounts: HashSet<Uuid> = match scope {
            LoanScope::Owner(user_id) => state.account_ids_of(user_id),
            LoanScope::Branch(branch_id) => state
                .accounts
                .values()
                .filter(|a| {
                    state
                        .users
                        .get(&a.owner_id)
                        .map_or(false, |u| u.branch_id == Some(branch_id))
                })
                .map(|a| a.id)
                .collect(),
        };
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| accounts.contains(&l.account_id))
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans)
    }

    async fn execute_payment(&self, owner_id: Uuid, order: PaymentOrder) -> AppResult<Payment> {
        let mut state = self.state.write().await;
        let mut account = state.owned_account(owner_id, order.account_id)?.clone();

        let payment = order.execute(&mut account)?;

        state.accounts.insert(account.id, account);
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let state = self.state.read().await;
        let owned = state.account_ids_of(user_id);
        let mut payments: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| owned.contains(&p.account_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    #[tokio::test]
    async fn test_token_resolves_to_principal_with_role() {
        let store = MemoryBankStore::new();
        let branch = store.insert_branch(Branch::new("Norte", "Calle 1", None)).await.unwrap();
        let clerk = store.insert_user(User::employee("marta", branch.id)).await.unwrap();
        store.issue_token(clerk.id, "tok-marta").await.unwrap();

        let principal = store.principal_for_token("tok-marta").await.unwrap().unwrap();

        assert_eq!(principal.user_id, clerk.id);
        assert_eq!(principal.role, Role::Employee { branch_id: branch.id });
        assert!(store.principal_for_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryBankStore::new();
        store.insert_user(User::customer("luis", None)).await.unwrap();

        assert!(store.insert_user(User::customer("luis", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_accounts_listed_oldest_first() {
        let store = MemoryBankStore::new();
        let ids = IdentifierGenerator::random();
        let user = store.insert_user(User::customer("rosa", None)).await.unwrap();

        let first = store.create_account(user.id, AccountType::Savings, &ids).await.unwrap();
        let second = store.create_account(user.id, AccountType::Checking, &ids).await.unwrap();

        let accounts = store.list_accounts(user.id).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, first.id);
        assert_eq!(accounts[1].id, second.id);
        assert_ne!(first.number, second.number);
    }

    #[tokio::test]
    async fn test_lookup_by_username_or_id() {
        let store = MemoryBankStore::new();
        let user = store.insert_user(User::customer("pablo", None)).await.unwrap();

        let by_name = store.find_user_by_username_or_id("pablo").await.unwrap();
        let by_id = store
            .find_user_by_username_or_id(&user.id.to_string())
            .await
            .unwrap();

        assert_eq!(by_name.map(|u| u.id), Some(user.id));
        assert_eq!(by_id.map(|u| u.id), Some(user.id));
        assert!(store.find_user_by_username_or_id("ghost").await.unwrap().is_none());
    }
}
