//! Hash chain verification
//!
//! Integrity failures are data, not errors: verification always returns a
//! [`ChainReport`], which names the first offending record when the chain is
//! broken.

use crate::canonical::Fields;
use crate::hash::compute_hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A record that participates in a hash chain
pub trait Chained {
    /// Identifier reported when this record fails verification
    fn record_id(&self) -> &str;

    /// Digest of the predecessor (empty for the first record)
    fn prev_hash(&self) -> &str;

    /// Digest stored on this record
    fn curr_hash(&self) -> &str;

    /// Every hashed field, i.e. the record without `prev_hash` / `curr_hash`
    fn hashable_fields(&self) -> Fields;
}

/// What went wrong at a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    /// `prev_hash` does not point at the preceding record's `curr_hash`
    BrokenLink { expected: String, actual: String },
    /// Stored `curr_hash` differs from the recomputed digest
    InvalidHash { expected: String, actual: String },
}

/// First failing link of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainViolation {
    /// Position in the verified slice
    pub index: usize,
    pub record_id: String,
    pub kind: ViolationKind,
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::BrokenLink { expected, actual } => write!(
                f,
                "Broken link at index {} ({}): expected prev_hash '{}', got '{}'",
                self.index, self.record_id, expected, actual
            ),
            ViolationKind::InvalidHash { expected, actual } => write!(
                f,
                "Invalid hash at index {} ({}): expected '{}', got '{}'",
                self.index, self.record_id, expected, actual
            ),
        }
    }
}

impl std::error::Error for ChainViolation {}

/// Outcome of verifying a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Records inspected (up to and including the first violation)
    pub checked: usize,
    /// Records supplied
    pub total: usize,
    pub violation: Option<ChainViolation>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }

    pub fn first_invalid_index(&self) -> Option<usize> {
        self.violation.as_ref().map(|v| v.index)
    }
}

/// Verify an ordered slice of records.
///
/// The first record's `prev_hash` is taken on trust, so a contiguous window
/// of a longer chain can be checked. Use [`validate_chain_from`] with
/// [`GENESIS_PREV_HASH`](crate::GENESIS_PREV_HASH) to verify a whole table.
pub fn validate_chain<R: Chained>(records: &[R]) -> ChainReport {
    match records.first() {
        Some(first) => {
            let anchor = first.prev_hash().to_string();
            validate_chain_from(&anchor, records)
        }
        None => ChainReport {
            checked: 0,
            total: 0,
            violation: None,
        },
    }
}

/// Verify an ordered slice whose first record must link to `anchor`
pub fn validate_chain_from<R: Chained>(anchor: &str, records: &[R]) -> ChainReport {
    let mut expected_prev = anchor.to_string();

    for (index, record) in records.iter().enumerate() {
        if record.prev_hash() != expected_prev {
            return failed(
                index,
                records.len(),
                record,
                ViolationKind::BrokenLink {
                    expected: expected_prev,
                    actual: record.prev_hash().to_string(),
                },
            );
        }

        let calculated = compute_hash(record.prev_hash(), &record.hashable_fields());
        if calculated != record.curr_hash() {
            return failed(
                index,
                records.len(),
                record,
                ViolationKind::InvalidHash {
                    expected: calculated,
                    actual: record.curr_hash().to_string(),
                },
            );
        }

        expected_prev = record.curr_hash().to_string();
    }

    ChainReport {
        checked: records.len(),
        total: records.len(),
        violation: None,
    }
}

/// Boolean shorthand for [`validate_chain`]
pub fn is_valid_chain<R: Chained>(records: &[R]) -> bool {
    validate_chain(records).is_valid()
}

fn failed<R: Chained>(index: usize, total: usize, record: &R, kind: ViolationKind) -> ChainReport {
    ChainReport {
        checked: index + 1,
        total,
        violation: Some(ChainViolation {
            index,
            record_id: record.record_id().to_string(),
            kind,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::GENESIS_PREV_HASH;
    use serde_json::json;

    #[derive(Clone)]
    struct Link {
        id: String,
        note: String,
        prev_hash: String,
        curr_hash: String,
    }

    impl Chained for Link {
        fn record_id(&self) -> &str {
            &self.id
        }
        fn prev_hash(&self) -> &str {
            &self.prev_hash
        }
        fn curr_hash(&self) -> &str {
            &self.curr_hash
        }
        fn hashable_fields(&self) -> Fields {
            let mut f = Fields::new();
            f.insert("id".into(), json!(self.id));
            f.insert("note".into(), json!(self.note));
            f
        }
    }

    fn build_chain(n: usize) -> Vec<Link> {
        let mut links: Vec<Link> = Vec::new();
        for i in 0..n {
            let prev = links
                .last()
                .map(|l| l.curr_hash.clone())
                .unwrap_or_else(|| GENESIS_PREV_HASH.to_string());
            let mut link = Link {
                id: format!("rec-{}", i),
                note: format!("event {}", i),
                prev_hash: prev,
                curr_hash: String::new(),
            };
            link.curr_hash = compute_hash(&link.prev_hash, &link.hashable_fields());
            links.push(link);
        }
        links
    }

    #[test]
    fn test_verify_valid_chain() {
        let chain = build_chain(5);
        let report = validate_chain_from(GENESIS_PREV_HASH, &chain);
        assert!(report.is_valid());
        assert_eq!(report.checked, 5);
        assert!(is_valid_chain(&chain));
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let chain: Vec<Link> = Vec::new();
        assert!(validate_chain(&chain).is_valid());
    }

    #[test]
    fn test_tamper_detected_at_modified_index() {
        for k in 1..4 {
            let mut chain = build_chain(4);
            chain[k].note = "rewritten".to_string();

            let report = validate_chain(&chain);
            assert!(!report.is_valid());
            assert_eq!(report.first_invalid_index(), Some(k));
            let violation = report.violation.unwrap();
            assert_eq!(violation.record_id, format!("rec-{}", k));
            assert!(matches!(violation.kind, ViolationKind::InvalidHash { .. }));
        }
    }

    #[test]
    fn test_rehashed_tamper_breaks_next_link() {
        let mut chain = build_chain(3);
        chain[1].note = "rewritten".to_string();
        chain[1].curr_hash = compute_hash(&chain[1].prev_hash, &chain[1].hashable_fields());

        let report = validate_chain(&chain);
        assert_eq!(report.first_invalid_index(), Some(2));
        assert!(matches!(
            report.violation.unwrap().kind,
            ViolationKind::BrokenLink { .. }
        ));
    }

    #[test]
    fn test_removed_record_detected() {
        let mut chain = build_chain(4);
        chain.remove(2);

        let report = validate_chain(&chain);
        assert_eq!(report.first_invalid_index(), Some(2));
    }

    #[test]
    fn test_missing_genesis_detected_only_with_anchor() {
        let chain = build_chain(3);
        let window = &chain[1..];

        assert!(validate_chain(window).is_valid());
        let anchored = validate_chain_from(GENESIS_PREV_HASH, window);
        assert_eq!(anchored.first_invalid_index(), Some(0));
    }

    #[test]
    fn test_violation_display() {
        let mut chain = build_chain(2);
        chain[1].note = "x".to_string();
        let violation = validate_chain(&chain).violation.unwrap();
        assert!(violation.to_string().starts_with("Invalid hash at index 1 (rec-1)"));
    }
}
