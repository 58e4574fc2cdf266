//! Guard errors

use thiserror::Error;

/// Guard construction failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// No usable secret / identity / device at startup. Fatal.
    #[error("Dual-control guard misconfigured: {0}")]
    Misconfigured(String),
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Misconfigured(_) => "MISCONFIGURED",
        }
    }
}

/// Why a destructive request was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Operator identity does not match the authorized operator")]
    InvalidIdentity,

    #[error("Device fingerprint does not match the authorized device")]
    InvalidDevice,

    #[error("Attestation missing or invalid")]
    InvalidAttestation,
}

impl Rejection {
    /// Stable error code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidIdentity => "INVALID_IDENTITY",
            Rejection::InvalidDevice => "INVALID_DEVICE",
            Rejection::InvalidAttestation => "INVALID_ATTESTATION",
        }
    }
}
