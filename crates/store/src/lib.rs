//! LedgerSeal Store - SQLite persistence
//!
//! Repository pattern over the two ledger tables (`account_history`,
//! `transaction_ledger`) and the business tables they describe (`users`,
//! `transactions`).

pub mod database;
pub mod error;
pub mod filter;
pub mod mutation;
pub mod repos;
pub mod schema;

pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use filter::RecordFilter;
pub use mutation::Mutation;
pub use repos::{ChainTail, LedgerRepo, TransactionRepo, UserRepo};
pub use schema::{LedgerRow, TransactionRow, UserRow};
