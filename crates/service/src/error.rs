//! Service errors
//!
//! Every failure maps onto one stable code. Guard rejections, chain conflicts
//! and lock timeouts are expected under normal operation and are kept apart
//! from persistence failures.

use ledgerseal_chain::ChainViolation;
use ledgerseal_guard::{GuardError, Rejection};
use ledgerseal_ledger::{LedgerError, LedgerKind};
use ledgerseal_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Dual-control rejected: {0}")]
    Unauthorized(Rejection),

    #[error(transparent)]
    Misconfigured(#[from] GuardError),

    #[error("Chain write conflict on {kind} after {attempts} attempts")]
    ChainWriteConflict { kind: LedgerKind, attempts: u32 },

    #[error("Timed out after {waited_ms}ms waiting for the {kind} tail lock")]
    LockTimeout { kind: LedgerKind, waited_ms: u64 },

    #[error("Chain integrity violation in {kind}: {violation}")]
    IntegrityViolation {
        kind: LedgerKind,
        violation: ChainViolation,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] LedgerError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Persistence failure: {0}")]
    Persistence(StoreError),
}

/// Result type alias for ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StoreError::Rejected(err) => ServiceError::InvalidRecord(err),
            other => ServiceError::Persistence(other),
        }
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        ServiceError::Unauthorized(rejection)
    }
}

impl ServiceError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(rejection) => rejection.code(),
            ServiceError::Misconfigured(err) => err.code(),
            ServiceError::ChainWriteConflict { .. } => "CHAIN_WRITE_CONFLICT",
            ServiceError::LockTimeout { .. } => "LOCK_TIMEOUT",
            ServiceError::IntegrityViolation { .. } => "CHAIN_INTEGRITY_VIOLATION",
            ServiceError::InvalidRecord(_) => "INVALID_RECORD",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Expected, caller-correctable failures. Persistence failures, integrity
    /// violations and misconfiguration are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::Unauthorized(_)
                | ServiceError::ChainWriteConflict { .. }
                | ServiceError::LockTimeout { .. }
                | ServiceError::InvalidRecord(_)
                | ServiceError::NotFound { .. }
        )
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ServiceError::Unauthorized(rejection) => Some(*rejection),
            _ => None,
        }
    }
}
