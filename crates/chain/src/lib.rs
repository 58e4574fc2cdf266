//! LedgerSeal Chain - Hash chain primitive
//!
//! Makes an append-only record sequence tamper-evident without external
//! infrastructure. Every record's digest covers its own canonical fields and
//! the digest of the record before it, so any retroactive edit breaks the
//! chain from that point on.
//!
//! # Key Items
//! - [`canonicalize`]: Deterministic serialization of a field map
//! - [`compute_hash`]: Chained SHA-256 digest
//! - [`audit_hash`]: Chained digest with a server-generated stamp
//! - [`validate_chain`]: Recompute and compare every link, report the first failure

pub mod canonical;
pub mod hash;
pub mod verify;

pub use canonical::{canonicalize, Fields};
pub use hash::{
    audit_hash, audit_hash_at, compute_hash, format_stamp, hash, parse_stamp, truncate_stamp,
    StampedDigest, GENESIS_PREV_HASH, STAMP_FIELD,
};
pub use verify::{
    is_valid_chain, validate_chain, validate_chain_from, ChainReport, ChainViolation, Chained,
    ViolationKind,
};
