//! Inbound authorization headers

/// Operator identity header
pub const HEADER_OPERATOR_IDENTITY: &str = "x-operator-identity";
/// Device fingerprint header
pub const HEADER_DEVICE_FINGERPRINT: &str = "x-device-fingerprint";
/// HMAC attestation header (lowercase hex)
pub const HEADER_ATTESTATION: &str = "x-dual-control-attestation";
/// Unix seconds the attestation was minted at (time-bound mode only)
pub const HEADER_ATTESTATION_TIMESTAMP: &str = "x-attestation-timestamp";

/// The dual-control factors presented with a destructive request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationHeaders {
    pub operator_identity: Option<String>,
    pub device_fingerprint: Option<String>,
    pub attestation: Option<String>,
    pub attestation_timestamp: Option<String>,
}

impl AuthorizationHeaders {
    pub fn new(
        operator_identity: impl Into<String>,
        device_fingerprint: impl Into<String>,
        attestation: impl Into<String>,
    ) -> Self {
        Self {
            operator_identity: Some(operator_identity.into()),
            device_fingerprint: Some(device_fingerprint.into()),
            attestation: Some(attestation.into()),
            attestation_timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.attestation_timestamp = Some(timestamp.into());
        self
    }

    /// Pick the known headers out of raw name/value pairs.
    ///
    /// Names are matched case-insensitively; unknown headers are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut headers = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_ref().to_ascii_lowercase().as_str() {
                HEADER_OPERATOR_IDENTITY => &mut headers.operator_identity,
                HEADER_DEVICE_FINGERPRINT => &mut headers.device_fingerprint,
                HEADER_ATTESTATION => &mut headers.attestation,
                HEADER_ATTESTATION_TIMESTAMP => &mut headers.attestation_timestamp,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        headers
    }
}
