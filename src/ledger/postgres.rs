//! PostgreSQL [`BankStore`]
//!
//! Each mutating unit is one transaction. Account rows are locked with
//! `SELECT ... FOR UPDATE`, always ordered by id, before their balances are
//! read; loan transitions lock the loan row first and then its account.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{token_digest, BankStore, LoanScope};
use crate::domain::access;
use crate::domain::{
    Account, AccountType, Amount, Balance, Branch, Card, CardDraft, CardProvider, CardType,
    DomainError, Loan, LoanAction, LoanStatus, Payment, PaymentOrder, PaymentStatus, Principal,
    Recipient, Role, Transfer, TransferOrder, User,
};
use crate::error::{AppError, AppResult};
use crate::identifiers::{default_expiration, IdentifierFormat, IdentifierGenerator};

const ACCOUNT_COLUMNS: &str =
    "id, number, owner_id, account_type, balance_pesos, balance_dolares, created_at";
const CARD_COLUMNS: &str =
    "c.id, c.account_id, c.number, c.card_type, c.provider, c.cvv, c.expiration, c.created_at";
const LOAN_COLUMNS: &str = "l.id, l.account_id, l.principal, l.interest_rate, l.total_repayment, \
     l.monthly_installment, l.start_date, l.duration_months, l.status, l.created_at, l.updated_at";
const USER_COLUMNS: &str = "id, username, email, first_name, last_name, phone, address, \
     is_employee, branch_id, created_at";

// =========================================================================
// Row types
// =========================================================================

fn corrupt(table: &'static str) -> impl Fn(String) -> AppError {
    move |reason| AppError::Internal(format!("Corrupt {table} row: {reason}"))
}

#[derive(Debug, FromRow)]
struct BranchRow {
    id: Uuid,
    name: String,
    address: String,
    phone: Option<String>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            name: row.name,
            address: row.address,
            phone: row.phone,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address: Option<String>,
    is_employee: bool,
    branch_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            address: row.address,
            is_employee: row.is_employee,
            branch_id: row.branch_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    number: String,
    owner_id: Uuid,
    account_type: String,
    balance_pesos: Decimal,
    balance_dolares: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let err = corrupt("accounts");
        Ok(Account {
            id: row.id,
            number: row.number,
            owner_id: row.owner_id,
            account_type: row
                .account_type
                .parse::<AccountType>()
                .map_err(|e| err(e.to_string()))?,
            balance_pesos: Balance::new(row.balance_pesos).map_err(|e| err(e.to_string()))?,
            balance_dolares: Balance::new(row.balance_dolares).map_err(|e| err(e.to_string()))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CardRow {
    id: Uuid,
    account_id: Uuid,
    number: String,
    card_type: String,
    provider: Option<String>,
    cvv: String,
    expiration: NaiveDate,
    created_at: DateTime<Utc>,
}

impl TryFrom<CardRow> for Card {
    type Error = AppError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        let err = corrupt("cards");
        Ok(Card {
            id: row.id,
            account_id: row.account_id,
            number: row.number,
            card_type: row
                .card_type
                .parse::<CardType>()
                .map_err(|e| err(e.to_string()))?,
            provider: row
                .provider
                .map(|p| p.parse::<CardProvider>())
                .transpose()
                .map_err(|e| err(e.to_string()))?,
            cvv: row.cvv,
            expiration: row.expiration,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    origin_account_id: Uuid,
    destination_account_id: Uuid,
    amount: Decimal,
    description: Option<String>,
    sender_username: String,
    receiver_username: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(Transfer {
            id: row.id,
            origin_account_id: row.origin_account_id,
            destination_account_id: row.destination_account_id,
            amount: Amount::new(row.amount).map_err(|e| corrupt("transfers")(e.to_string()))?,
            description: row.description,
            sender_username: row.sender_username,
            receiver_username: row.receiver_username,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LoanRow {
    id: Uuid,
    account_id: Uuid,
    principal: Decimal,
    interest_rate: Decimal,
    total_repayment: Decimal,
    monthly_installment: Decimal,
    start_date: NaiveDate,
    duration_months: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let err = corrupt("loans");
        Ok(Loan {
            id: row.id,
            account_id: row.account_id,
            principal: Amount::new(row.principal).map_err(|e| err(e.to_string()))?,
            interest_rate: row.interest_rate,
            total_repayment: row.total_repayment,
            monthly_installment: row.monthly_installment,
            start_date: row.start_date,
            duration_months: row.duration_months,
            status: row
                .status
                .parse::<LoanStatus>()
                .map_err(|e| err(e.to_string()))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    account_id: Uuid,
    service: String,
    amount: Decimal,
    status: String,
    paid_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let err = corrupt("payments");
        Ok(Payment {
            id: row.id,
            account_id: row.account_id,
            service: row.service,
            amount: Amount::new(row.amount).map_err(|e| err(e.to_string()))?,
            status: row
                .status
                .parse::<PaymentStatus>()
                .map_err(|e| err(e.to_string()))?,
            paid_at: row.paid_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =========================================================================
// Store
// =========================================================================

/// Production store backed by a `PgPool`
#[derive(Debug, Clone)]
pub struct PgBankStore {
    pool: PgPool,
}

impl PgBankStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lock the given accounts in id order and return them
    async fn lock_accounts(
        tx: &mut Transaction<'_, Postgres>,
        account_ids: &[Uuid],
    ) -> AppResult<Vec<Account>> {
        let mut ids = account_ids.to_vec();
        ids.sort();
        ids.dedup();

        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        convert_all(rows)
    }

    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> AppResult<Account> {
        Self::lock_accounts(tx, &[account_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }

    async fn store_balances(
        tx: &mut Transaction<'_, Postgres>,
        account: &Account,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET balance_pesos = $2, balance_dolares = $3
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.balance_pesos.value())
        .bind(account.balance_dolares.value())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn number_taken<'e, E>(
        executor: E,
        table: &'static str,
        candidate: String,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE number = $1)");
        sqlx::query_scalar(&sql)
            .bind(candidate)
            .fetch_one(executor)
            .await
    }

    async fn resolve_recipient(
        tx: &mut Transaction<'_, Postgres>,
        recipient: &Recipient,
    ) -> AppResult<Uuid> {
        let found: Option<Uuid> = match recipient {
            Recipient::AccountNumber(number) => {
                sqlx::query_scalar("SELECT id FROM accounts WHERE number = $1")
                    .bind(number)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            Recipient::Username(username) => {
                sqlx::query_scalar(
                    r#"
                    SELECT a.id FROM accounts a
                    JOIN users u ON u.id = a.owner_id
                    WHERE u.username = $1
                    ORDER BY a.created_at, a.id
                    LIMIT 1
                    "#,
                )
                .bind(username)
                .fetch_optional(&mut **tx)
                .await?
            }
        };
        found.ok_or_else(|| DomainError::RecipientNotFound(recipient.as_str().to_string()).into())
    }
}

#[async_trait]
impl BankStore for PgBankStore {
    async fn principal_for_token(&self, token: &str) -> AppResult<Option<Principal>> {
        let row: Option<(Uuid, String, bool, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.is_employee, u.branch_id
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1
              AND (t.expires_at IS NULL OR t.expires_at > NOW())
            "#,
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, username, is_employee, branch_id)| {
            let role = match (is_employee, branch_id) {
                (true, Some(branch_id)) => Role::Employee { branch_id },
                _ => Role::Customer,
            };
            Principal {
                user_id,
                username,
                role,
            }
        }))
    }

    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username_or_id(&self, key: &str) -> AppResult<Option<User>> {
        if let Ok(id) = key.parse::<Uuid>() {
            if let Some(user) = self.find_user(id).await? {
                return Ok(Some(user));
            }
        }
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn save_user_address(&self, user: &User) -> AppResult<()> {
        let updated = sqlx::query("UPDATE users SET address = $2 WHERE id = $1")
            .bind(user.id)
            .bind(&user.address)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(DomainError::not_found("User", user.id).into());
        }
        Ok(())
    }

    async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        let rows: Vec<BranchRow> =
            sqlx::query_as("SELECT id, name, address, phone FROM branches ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }

    async fn find_branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        let row: Option<BranchRow> =
            sqlx::query_as("SELECT id, name, address, phone FROM branches WHERE id = $1")
                .bind(branch_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Branch::from))
    }

    async fn list_branch_employees(&self, branch_id: Uuid) -> AppResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE branch_id = $1 AND is_employee ORDER BY username"
        ))
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn create_account(
        &self,
        owner_id: Uuid,
        account_type: AccountType,
        ids: &IdentifierGenerator,
    ) -> AppResult<Account> {
        let owner_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;
        if !owner_exists {
            return Err(DomainError::not_found("User", owner_id).into());
        }

        loop {
            let number = ids
                .next_unique_async(IdentifierFormat::AccountNumber, |candidate| {
                    Self::number_taken(&self.pool, "accounts", candidate)
                })
                .await?;
            let account = Account::open(owner_id, account_type, number);

            // Lost a race for the number: draw again.
            let inserted: Option<AccountRow> = sqlx::query_as(&format!(
                r#"
                INSERT INTO accounts (id, number, owner_id, account_type, balance_pesos, balance_dolares, created_at)
                VALUES ($1, $2, $3, $4, 0, 0, $5)
                ON CONFLICT (number) DO NOTHING
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(account.id)
            .bind(&account.number)
            .bind(account.owner_id)
            .bind(account.account_type.as_str())
            .bind(account.created_at)
            .fetch_optional(&self.pool)
            .await?;

            match inserted {
                Some(row) => return row.try_into(),
                None => tracing::debug!(number = %account.number, "Account number taken concurrently"),
            }
        }
    }

    async fn find_account(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Account::try_from).transpose()
    }

    async fn list_accounts(&self, owner_id: Uuid) -> AppResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 ORDER BY created_at, id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let account = Self::lock_account(&mut tx, account_id).await?;
        if account.owner_id != owner_id {
            return Err(DomainError::AccountNotFound(account_id.to_string()).into());
        }

        let attached_cards: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&mut *tx)
                .await?;
        account.ensure_deletable(attached_cards as usize)?;

        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_card(
        &self,
        owner_id: Uuid,
        draft: CardDraft,
        ids: &IdentifierGenerator,
    ) -> AppResult<Card> {
        draft.validate()?;
        // Shared with the uniqueness check so issuance holds a single connection.
        let tx = Mutex::new(self.pool.begin().await?);

        // Locked so a concurrent delete cannot miss the new card.
        let account = Self::lock_account(&mut *tx.lock().await, draft.account_id).await?;
        if account.owner_id != owner_id {
            return Err(DomainError::AccountNotOwned(account.id).into());
        }

        let cvv = draft.cvv.clone().unwrap_or_else(|| ids.cvv());
        let expiration = draft
            .expiration
            .unwrap_or_else(|| default_expiration(Utc::now().date_naive()));

        let card = loop {
            let number = match &draft.number {
                Some(number) => number.clone(),
                None => {
                    ids.next_unique_async(IdentifierFormat::CardNumber, |candidate| {
                        let tx = &tx;
                        async move {
                            let mut conn = tx.lock().await;
                            Self::number_taken(&mut **conn, "cards", candidate).await
                        }
                    })
                    .await?
                }
            };
            let card = draft.clone().issue(number, cvv.clone(), expiration);

            let inserted = sqlx::query(
                r#"
                INSERT INTO cards (id, account_id, number, card_type, provider, cvv, expiration, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (number) DO NOTHING
                "#,
            )
            .bind(card.id)
            .bind(card.account_id)
            .bind(&card.number)
            .bind(card.card_type.as_str())
            .bind(card.provider.map(|p| p.as_str()))
            .bind(&card.cvv)
            .bind(card.expiration)
            .bind(card.created_at)
            .execute(&mut **tx.lock().await)
            .await?
            .rows_affected();

            if inserted == 1 {
                break card;
            }
            if draft.number.is_some() {
                return Err(DomainError::Validation("Card number already exists".to_string()).into());
            }
            tracing::debug!("Card number taken concurrently, drawing again");
        };

        tx.into_inner().commit().await?;
        Ok(card)
    }

    async fn list_cards_for_user(&self, user_id: Uuid) -> AppResult<Vec<Card>> {
        let rows: Vec<CardRow> = sqlx::query_as(&format!(
            "SELECT {CARD_COLUMNS} FROM cards c \
             JOIN accounts a ON a.id = c.account_id \
             WHERE a.owner_id = $1 ORDER BY c.created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_card(&self, owner_id: Uuid, card_id: Uuid) -> AppResult<()> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM cards c
            USING accounts a
            WHERE c.id = $1 AND c.account_id = a.id AND a.owner_id = $2
            "#,
        )
        .bind(card_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(DomainError::not_found("Card", card_id).into());
        }
        Ok(())
    }

    async fn execute_transfer(
        &self,
        sender: &Principal,
        order: TransferOrder,
    ) -> AppResult<Transfer> {
        let mut tx = self.pool.begin().await?;

        let origin_id = match order.origin {
            Some(account_id) => account_id,
            None => sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM accounts WHERE owner_id = $1 ORDER BY created_at, id LIMIT 1",
            )
            .bind(sender.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                DomainError::Validation("The sender has no account to transfer from".to_string())
            })?,
        };
        let destination_id = Self::resolve_recipient(&mut tx, &order.recipient).await?;

        let locked = Self::lock_accounts(&mut tx, &[origin_id, destination_id]).await?;
        let mut origin = locked
            .iter()
            .find(|a| a.id == origin_id)
            .cloned()
            .ok_or_else(|| DomainError::AccountNotFound(origin_id.to_string()))?;
        let mut destination = locked
            .iter()
            .find(|a| a.id == destination_id)
            .cloned()
            .ok_or_else(|| DomainError::RecipientNotFound(order.recipient.as_str().to_string()))?;
        access::ensure_owner(sender, origin.id, origin.owner_id)?;

        let usernames: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, username FROM users WHERE id = ANY($1)")
                .bind(vec![origin.owner_id, destination.owner_id])
                .fetch_all(&mut *tx)
                .await?;
        let username_of = |user_id: Uuid| -> AppResult<String> {
            usernames
                .iter()
                .find(|(id, _)| *id == user_id)
                .map(|(_, name)| name.clone())
                .ok_or_else(|| DomainError::not_found("User", user_id).into())
        };
        let sender_username = username_of(origin.owner_id)?;
        let receiver_username = username_of(destination.owner_id)?;

        let transfer = Transfer::settle(
            &mut origin,
            &mut destination,
            order.amount,
            order.description,
            &sender_username,
            &receiver_username,
        )?;

        Self::store_balances(&mut tx, &origin).await?;
        Self::store_balances(&mut tx, &destination).await?;

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, origin_account_id, destination_account_id, amount, description,
                sender_username, receiver_username, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.origin_account_id)
        .bind(transfer.destination_account_id)
        .bind(transfer.amount.value())
        .bind(&transfer.description)
        .bind(&transfer.sender_username)
        .bind(&transfer.receiver_username)
        .bind(transfer.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transfer)
    }

    async fn list_transfers_sent(&self, user_id: Uuid) -> AppResult<Vec<Transfer>> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.origin_account_id, t.destination_account_id, t.amount, t.description,
                   t.sender_username, t.receiver_username, t.created_at
            FROM transfers t
            JOIN accounts a ON a.id = t.origin_account_id
            WHERE a.owner_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_loan(&self, owner_id: Uuid, loan: Loan) -> AppResult<Loan> {
        let account_owner: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM accounts WHERE id = $1")
                .bind(loan.account_id)
                .fetch_optional(&self.pool)
                .await?;
        match account_owner {
            None => return Err(DomainError::AccountNotFound(loan.account_id.to_string()).into()),
            Some(owner) if owner != owner_id => {
                return Err(DomainError::AccountNotOwned(loan.account_id).into())
            }
            Some(_) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO loans (
                id, account_id, principal, interest_rate, total_repayment, monthly_installment,
                start_date, duration_months, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(loan.id)
        .bind(loan.account_id)
        .bind(loan.principal.value())
        .bind(loan.interest_rate)
        .bind(loan.total_repayment)
        .bind(loan.monthly_installment)
        .bind(loan.start_date)
        .bind(loan.duration_months)
        .bind(loan.status.as_str())
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn transition_loan(
        &self,
        actor: &Principal,
        loan_id: Uuid,
        action: LoanAction,
    ) -> AppResult<Loan> {
        access::require_employee(actor)?;
        let mut tx = self.pool.begin().await?;

        let row: Option<LoanRow> = sqlx::query_as(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans l WHERE l.id = $1 FOR UPDATE"
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut loan: Loan = row
            .ok_or_else(|| AppError::from(DomainError::not_found("Loan", loan_id)))?
            .try_into()?;

        let mut account = Self::lock_account(&mut tx, loan.account_id).await?;
        let owner_branch: Option<Uuid> =
            sqlx::query_scalar::<_, Option<Uuid>>("SELECT branch_id FROM users WHERE id = $1")
                .bind(account.owner_id)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();
        access::ensure_supervisor(actor, owner_branch)?;

        loan.apply(action, &mut account)?;

        Self::store_balances(&mut tx, &account).await?;
        sqlx::query("UPDATE loans SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(loan.id)
            .bind(loan.status.as_str())
            .bind(loan.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn find_loan(&self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let row: Option<LoanRow> =
            sqlx::query_as(&format!("SELECT {LOAN_COLUMNS} FROM loans l WHERE l.id = $1"))
                .bind(loan_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Loan::try_from).transpose()
    }

    async fn list_loans(&self, scope: LoanScope) -> AppResult<Vec<Loan>> {
        let rows: Vec<LoanRow> = match scope {
            LoanScope::Owner(user_id) => {
                sqlx::query_as(&format!(
                    "SELECT {LOAN_COLUMNS} FROM loans l \
                     JOIN accounts a ON a.id = l.account_id \
                     WHERE a.owner_id = $1 ORDER BY l.created_at DESC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            LoanScope::Branch(branch_id) => {
                sqlx::query_as(&format!(
                    "SELECT {LOAN_COLUMNS} FROM loans l \
                     JOIN accounts a ON a.id = l.account_id \
                     JOIN users u ON u.id = a.owner_id \
                     WHERE u.branch_id = $1 ORDER BY l.created_at DESC"
                ))
                .bind(branch_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        convert_all(rows)
    }

    async fn execute_payment(&self, owner_id: Uuid, order: PaymentOrder) -> AppResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let mut account = Self::lock_account(&mut tx, order.account_id).await?;
        if account.owner_id != owner_id {
            return Err(DomainError::AccountNotOwned(account.id).into());
        }

        let payment = order.execute(&mut account)?;

        Self::store_balances(&mut tx, &account).await?;
        sqlx::query(
            r#"
            INSERT INTO payments (id, account_id, service, amount, status, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id)
        .bind(payment.account_id)
        .bind(&payment.service)
        .bind(payment.amount.value())
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(payment)
    }

    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.account_id, p.service, p.amount, p.status, p.paid_at
            FROM payments p
            JOIN accounts a ON a.id = p.account_id
            WHERE a.owner_id = $1
            ORDER BY p.paid_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}
