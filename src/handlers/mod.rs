//! Command handlers module
//!
//! Handlers validate commands, build domain orders and hand them to the
//! [`BankStore`](crate::ledger::BankStore), which runs each one atomically.

mod account_handler;
mod commands;
mod loan_handler;
mod payment_handler;
mod transfer_handler;
mod update_user_handler;
mod user_handler;

#[cfg(test)]
mod tests;

pub use account_handler::{AccountHandler, CardHandler};
pub use commands::*;
pub use loan_handler::LoanHandler;
pub use payment_handler::PaymentHandler;
pub use transfer_handler::TransferHandler;
pub use update_user_handler::UpdateAddressHandler;
pub use user_handler::UserHandler;
