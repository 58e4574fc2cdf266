//! Guard configuration loaded from the secret boundary
//!
//! Values come from the environment at process start. Rotation of the master
//! secret is an operational procedure and is not handled here.

use crate::error::GuardError;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the HMAC master secret
pub const ENV_MASTER_SECRET: &str = "LEDGERSEAL_MASTER_SECRET";
/// Environment variable holding the authorized operator identity
pub const ENV_OPERATOR_IDENTITY: &str = "LEDGERSEAL_OPERATOR_IDENTITY";
/// Environment variable holding the authorized device fingerprint
pub const ENV_DEVICE_FINGERPRINT: &str = "LEDGERSEAL_DEVICE_FINGERPRINT";
/// Optional: enables [`AttestationMode::TimeBound`] with this many seconds
pub const ENV_ATTESTATION_WINDOW_SECS: &str = "LEDGERSEAL_ATTESTATION_WINDOW_SECS";

/// HMAC key bytes. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterSecret(<redacted {} bytes>)", self.0.len())
    }
}

/// What the attestation header is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttestationMode {
    /// HMAC over `identity:device`. A captured header stays valid until the
    /// secret is rotated.
    #[default]
    Static,

    /// HMAC over `identity:device:timestamp`; the timestamp header must be
    /// within `window` of the server clock.
    TimeBound { window: Duration },
}

/// Configuration for [`DualControlGuard`](crate::DualControlGuard)
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub master_secret: MasterSecret,
    pub operator_identity: String,
    pub device_fingerprint: String,
    pub mode: AttestationMode,
}

impl GuardConfig {
    /// Build a static-mode configuration
    pub fn new(
        master_secret: impl Into<Vec<u8>>,
        operator_identity: impl Into<String>,
        device_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            master_secret: MasterSecret::new(master_secret),
            operator_identity: operator_identity.into(),
            device_fingerprint: device_fingerprint.into(),
            mode: AttestationMode::Static,
        }
    }

    /// Switch to time-bound attestations
    pub fn with_mode(mut self, mode: AttestationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self, GuardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source (env, secret store, tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GuardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = require(&lookup, ENV_MASTER_SECRET)?;
        let identity = require(&lookup, ENV_OPERATOR_IDENTITY)?;
        let device = require(&lookup, ENV_DEVICE_FINGERPRINT)?;

        let mode = match lookup(ENV_ATTESTATION_WINDOW_SECS) {
            None => AttestationMode::Static,
            Some(raw) if raw.trim().is_empty() => AttestationMode::Static,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    GuardError::Misconfigured(format!(
                        "{} must be a whole number of seconds, got '{}'",
                        ENV_ATTESTATION_WINDOW_SECS, raw
                    ))
                })?;
                if secs == 0 {
                    return Err(GuardError::Misconfigured(format!(
                        "{} must be greater than zero",
                        ENV_ATTESTATION_WINDOW_SECS
                    )));
                }
                AttestationMode::TimeBound {
                    window: Duration::from_secs(secs),
                }
            }
        };

        Ok(Self::new(secret.into_bytes(), identity, device).with_mode(mode))
    }

    /// Reject empty values; the guard must never run on defaults
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.master_secret.is_empty() {
            return Err(GuardError::Misconfigured("master secret is empty".to_string()));
        }
        if self.operator_identity.trim().is_empty() {
            return Err(GuardError::Misconfigured(
                "operator identity is empty".to_string(),
            ));
        }
        if self.device_fingerprint.trim().is_empty() {
            return Err(GuardError::Misconfigured(
                "device fingerprint is empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String, GuardError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GuardError::Misconfigured(format!("{} is not set", key))),
    }
}
