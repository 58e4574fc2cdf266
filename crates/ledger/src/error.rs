//! Ledger errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while validating records and entities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("reason_code cannot be empty")]
    MissingReasonCode,

    #[error("policy_version cannot be empty")]
    MissingPolicyVersion,

    #[error("subject_id cannot be empty")]
    EmptySubjectId,

    #[error("Action {action} is not permitted in the {kind} ledger")]
    ActionNotPermitted { action: String, kind: String },

    #[error("Destructive action {0} requires dual-control authorization")]
    RequiresAuthorization(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Amount must be positive: {0}")]
    InvalidAmount(Decimal),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },
}
