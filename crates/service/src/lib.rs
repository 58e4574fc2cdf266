//! LedgerSeal Service - Ledger-writing services
//!
//! Ties every account and transaction mutation to a hash-chained ledger
//! record carrying a reason code and policy version.
//!
//! # Flow
//! 1. Destructive actions pass the dual-control guard (nothing is read or
//!    written on rejection)
//! 2. The ledger's tail lock is taken with a bounded wait
//! 3. Business mutation and ledger record commit in one transaction
//!
//! # Key Types
//! - `ServiceContext`: Database, guard and writer shared by all services
//! - `LedgerWriter`: The single append path, with conflict retry
//! - `AccountService` / `TransactionService`: Entity lifecycles
//! - `LedgerQuery`: History and search
//! - `IntegrityAuditor`: Whole-ledger verification

pub mod account;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod query;
pub mod transaction;
pub mod writer;

pub use account::AccountService;
pub use audit::{IntegrityAuditor, IntegrityReport};
pub use config::ServiceConfig;
pub use context::ServiceContext;
pub use error::{ServiceError, ServiceResult};
pub use query::LedgerQuery;
pub use transaction::TransactionService;
pub use writer::{Justification, LedgerWriter};
