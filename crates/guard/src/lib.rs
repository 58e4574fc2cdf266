//! LedgerSeal Guard - Dual-control authorization
//!
//! Destructive actions (deactivate, delete, refund, rollback) must carry
//! proof of two independent control factors before anything is written:
//!
//! 1. Operator identity header == configured identity
//! 2. Device fingerprint header == configured fingerprint
//! 3. Attestation header == HMAC-SHA256(master secret, "identity:device")
//!
//! The guard is a stateless validator. It performs no I/O and does no
//! logging; recording the attempt is the caller's job.

pub mod config;
pub mod error;
pub mod guard;
pub mod headers;

pub use config::{AttestationMode, GuardConfig, MasterSecret};
pub use error::{GuardError, Rejection};
pub use guard::{Authorization, DualControlGuard};
pub use headers::AuthorizationHeaders;
