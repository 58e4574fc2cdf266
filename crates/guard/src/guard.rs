//! Dual-control validator

use crate::config::{AttestationMode, GuardConfig};
use crate::error::{GuardError, Rejection};
use crate::headers::AuthorizationHeaders;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Proof that a request passed all three dual-control checks.
///
/// Only [`DualControlGuard`] can create one, so any API that takes an
/// `&Authorization` cannot be reached without passing the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    operator_identity: String,
    authorized_at: DateTime<Utc>,
}

impl Authorization {
    pub fn operator_identity(&self) -> &str {
        &self.operator_identity
    }

    pub fn authorized_at(&self) -> DateTime<Utc> {
        self.authorized_at
    }
}

/// Stateless dual-control guard. Cheap to clone and share across tasks.
#[derive(Clone)]
pub struct DualControlGuard {
    operator_identity: String,
    device_fingerprint: String,
    mode: AttestationMode,
    keyed_mac: HmacSha256,
}

impl std::fmt::Debug for DualControlGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualControlGuard")
            .field("operator_identity", &self.operator_identity)
            .field("device_fingerprint", &self.device_fingerprint)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl DualControlGuard {
    /// Build a guard, failing fast on an unusable configuration
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;

        let keyed_mac = HmacSha256::new_from_slice(config.master_secret.as_bytes())
            .map_err(|e| GuardError::Misconfigured(format!("invalid HMAC key: {}", e)))?;

        Ok(Self {
            operator_identity: config.operator_identity,
            device_fingerprint: config.device_fingerprint,
            mode: config.mode,
            keyed_mac,
        })
    }

    /// Build a guard from `LEDGERSEAL_*` environment variables
    pub fn from_env() -> Result<Self, GuardError> {
        Self::new(GuardConfig::from_env()?)
    }

    pub fn mode(&self) -> AttestationMode {
        self.mode
    }

    /// Validate the dual-control headers of a destructive request
    pub fn validate_destructive_action(
        &self,
        headers: &AuthorizationHeaders,
    ) -> Result<Authorization, Rejection> {
        self.validate_at(headers, Utc::now())
    }

    /// [`validate_destructive_action`](Self::validate_destructive_action) against an explicit clock
    pub fn validate_at(
        &self,
        headers: &AuthorizationHeaders,
        now: DateTime<Utc>,
    ) -> Result<Authorization, Rejection> {
        // 1. Identity
        let identity = headers
            .operator_identity
            .as_deref()
            .ok_or(Rejection::InvalidIdentity)?;
        if !constant_time_eq(identity, &self.operator_identity) {
            return Err(Rejection::InvalidIdentity);
        }

        // 2. Device
        let device = headers
            .device_fingerprint
            .as_deref()
            .ok_or(Rejection::InvalidDevice)?;
        if !constant_time_eq(device, &self.device_fingerprint) {
            return Err(Rejection::InvalidDevice);
        }

        // 3. Attestation
        let presented = headers
            .attestation
            .as_deref()
            .ok_or(Rejection::InvalidAttestation)?;

        let expected = match self.mode {
            AttestationMode::Static => self.sign(&static_message(identity, device)),
            AttestationMode::TimeBound { window } => {
                let minted = headers
                    .attestation_timestamp
                    .as_deref()
                    .and_then(|raw| raw.trim().parse::<i64>().ok())
                    .ok_or(Rejection::InvalidAttestation)?;

                let skew = now
                    .timestamp()
                    .checked_sub(minted)
                    .map(i64::unsigned_abs)
                    .ok_or(Rejection::InvalidAttestation)?;
                if skew > window.as_secs() {
                    return Err(Rejection::InvalidAttestation);
                }
                self.sign(&time_bound_message(identity, device, minted))
            }
        };

        if !constant_time_eq(presented, &expected) {
            return Err(Rejection::InvalidAttestation);
        }

        // 4. Authorized
        Ok(Authorization {
            operator_identity: identity.to_string(),
            authorized_at: now,
        })
    }

    /// Expected static attestation for `identity:device`
    pub fn attest(&self, identity: &str, device: &str) -> String {
        self.sign(&static_message(identity, device))
    }

    /// Expected time-bound attestation for `identity:device:timestamp`
    pub fn attest_at(&self, identity: &str, device: &str, timestamp: i64) -> String {
        self.sign(&time_bound_message(identity, device, timestamp))
    }

    /// Headers the configured operator would send right now
    pub fn issue_headers(&self, now: DateTime<Utc>) -> AuthorizationHeaders {
        let identity = self.operator_identity.as_str();
        let device = self.device_fingerprint.as_str();
        match self.mode {
            AttestationMode::Static => {
                AuthorizationHeaders::new(identity, device, self.attest(identity, device))
            }
            AttestationMode::TimeBound { .. } => {
                let ts = now.timestamp();
                AuthorizationHeaders::new(identity, device, self.attest_at(identity, device, ts))
                    .with_timestamp(ts.to_string())
            }
        }
    }

    fn sign(&self, message: &str) -> String {
        let mut mac = self.keyed_mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn static_message(identity: &str, device: &str) -> String {
    format!("{}:{}", identity, device)
}

fn time_bound_message(identity: &str, device: &str, timestamp: i64) -> String {
    format!("{}:{}:{}", identity, device, timestamp)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
