//! Ledger kinds, actions and actors
//!
//! Text forms (`Display` / `FromStr`) are what the store writes to its
//! columns and what gets hashed, so renaming a variant breaks every existing
//! chain.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// One global hash chain per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Account lifecycle: create, modify, deactivate, delete
    AccountHistory,
    /// Transaction lifecycle: append, status changes, refund, rollback
    TransactionLedger,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 2] = [LedgerKind::AccountHistory, LedgerKind::TransactionLedger];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            LedgerKind::AccountHistory => "account_history",
            LedgerKind::TransactionLedger => "transaction_ledger",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        Self::from_str(s).map_err(|_| LedgerError::UnknownValue {
            field: "ledger_kind",
            value: s.to_string(),
        })
    }
}

/// Operation recorded by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Modify,
    Deactivate,
    Delete,
    Append,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refund,
    Rollback,
}

impl Action {
    /// Destructive actions require dual-control authorization
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Action::Deactivate | Action::Delete | Action::Refund | Action::Rollback
        )
    }

    /// Whether this action may appear in the given ledger
    pub fn permitted_in(&self, kind: LedgerKind) -> bool {
        match kind {
            LedgerKind::AccountHistory => matches!(
                self,
                Action::Create
                    | Action::Modify
                    | Action::Deactivate
                    | Action::Delete
                    | Action::Rollback
            ),
            LedgerKind::TransactionLedger => matches!(
                self,
                Action::Append
                    | Action::Pending
                    | Action::Completed
                    | Action::Failed
                    | Action::Cancelled
                    | Action::Refund
                    | Action::Rollback
            ),
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        Self::from_str(s).map_err(|_| LedgerError::UnknownValue {
            field: "action",
            value: s.to_string(),
        })
    }
}

/// Who initiated an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// The platform itself
    System,
    /// Founder / operator, always behind dual control for destructive actions
    Operator,
    /// Automated edge process (webhooks, schedulers)
    EdgeProcess,
}

impl ActorType {
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        Self::from_str(s).map_err(|_| LedgerError::UnknownValue {
            field: "actor_type",
            value: s.to_string(),
        })
    }
}
