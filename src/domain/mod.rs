//! Domain module
//!
//! Core domain types and business logic. Nothing here touches storage or HTTP:
//! the stores load records, call into these types inside one atomic unit and
//! persist whatever comes back.

pub mod access;
pub mod account;
pub mod amount;
pub mod card;
pub mod context;
pub mod error;
pub mod loan;
pub mod payment;
pub mod summary;
pub mod transfer;
pub mod user;

pub use access::{Principal, Role};
pub use account::{Account, AccountType};
pub use amount::{Amount, AmountError, Balance};
pub use card::{Card, CardDraft, CardProvider, CardType};
pub use context::OperationContext;
pub use error::{DomainError, ErrorKind};
pub use loan::{Loan, LoanAction, LoanStatus, LoanTerms};
pub use payment::{Payment, PaymentOrder, PaymentStatus};
pub use summary::FinancialSummary;
pub use transfer::{Recipient, Transfer, TransferOrder};
pub use user::{Branch, User};
