//! LedgerSeal Ledger - Append-only records and the entities they describe
//!
//! # Key Types
//! - `LedgerKind`: Which global chain a record belongs to (account history, transaction ledger)
//! - `LedgerRecord`: One immutable, hash-chained mutation event
//! - `RecordDraft`: Caller-supplied part of a record, validated before sealing
//! - `Action` / `ActorType`: What happened and who initiated it
//! - `User` / `Transaction`: Business entities whose mutations are recorded

pub mod action;
pub mod entity;
pub mod error;
pub mod record;

pub use action::{Action, ActorType, LedgerKind};
pub use entity::{Transaction, TransactionStatus, User, UserStatus};
pub use error::LedgerError;
pub use record::{LedgerRecord, RecordDraft};
