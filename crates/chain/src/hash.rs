//! Chained digests
//!
//! `curr_hash = sha256(prev_hash + ":" + canonical(fields))`, or
//! `sha256(canonical(fields))` for the first link of a chain.

use crate::canonical::{canonicalize, Fields};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `prev_hash` of the first record in a chain
pub const GENESIS_PREV_HASH: &str = "";

/// Field name under which [`audit_hash`] stamps its timestamp
pub const STAMP_FIELD: &str = "stamped_at";

/// SHA-256 of arbitrary bytes, lowercase hex (64 chars)
pub fn hash(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Compute the digest of a chain link from its predecessor's digest
pub fn compute_hash(prev_hash: &str, fields: &Fields) -> String {
    let canonical = canonicalize(fields);
    if prev_hash.is_empty() {
        hash(canonical)
    } else {
        hash(format!("{}:{}", prev_hash, canonical))
    }
}

/// Digest plus the timestamp that was hashed into it.
///
/// The stamp MUST be persisted with the record; without it the digest can
/// never be reproduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedDigest {
    pub digest: String,
    pub stamped_at: DateTime<Utc>,
}

/// Like [`compute_hash`] but stamps the current server time into the payload
pub fn audit_hash(prev_hash: &str, fields: &Fields) -> StampedDigest {
    audit_hash_at(prev_hash, fields, Utc::now())
}

/// [`audit_hash`] with an explicit clock reading.
///
/// The stamp is truncated to microseconds so that it survives a round trip
/// through [`format_stamp`] / [`parse_stamp`]. An existing `stamped_at` field
/// is overwritten.
pub fn audit_hash_at(prev_hash: &str, fields: &Fields, at: DateTime<Utc>) -> StampedDigest {
    let stamped_at = truncate_stamp(at);

    let mut stamped = fields.clone();
    stamped.insert(STAMP_FIELD.to_string(), Value::String(format_stamp(&stamped_at)));

    StampedDigest {
        digest: compute_hash(prev_hash, &stamped),
        stamped_at,
    }
}

/// Drop sub-microsecond precision
pub fn truncate_stamp(at: DateTime<Utc>) -> DateTime<Utc> {
    let micros_only = (at.nanosecond() / 1_000) * 1_000;
    at.with_nanosecond(micros_only).unwrap_or(at)
}

/// Fixed-width RFC 3339 rendering used both for hashing and for storage
pub fn format_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Inverse of [`format_stamp`]
pub fn parse_stamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
