//! Bank back-office library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod identifiers;
pub mod ledger;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{Amount, AmountError, Balance, DomainError, ErrorKind, OperationContext};
pub use ledger::{BankStore, MemoryBankStore, PgBankStore};
