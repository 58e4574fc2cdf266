//! Integrity audit
//!
//! Re-reads an entire ledger in sequence order and verifies it against the
//! genesis anchor. A removed first record, a broken link and a rewritten
//! field all surface as a violation naming the first offending record.

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use ledgerseal_chain::{validate_chain_from, ChainViolation, GENESIS_PREV_HASH};
use ledgerseal_ledger::LedgerKind;
use ledgerseal_store::LedgerRepo;
use serde::Serialize;
use tracing::{error, info};

/// Result of auditing one ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub kind: LedgerKind,
    /// Records in the ledger
    pub total: usize,
    /// Records verified before the first violation (all of them when valid)
    pub checked: usize,
    pub violation: Option<ChainViolation>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }

    pub fn first_invalid_index(&self) -> Option<usize> {
        self.violation.as_ref().map(|v| v.index)
    }

    pub fn first_invalid_record(&self) -> Option<&str> {
        self.violation.as_ref().map(|v| v.record_id.as_str())
    }

    /// Turn a violation into `CHAIN_INTEGRITY_VIOLATION`
    pub fn into_result(self) -> ServiceResult<Self> {
        match self.violation {
            Some(violation) => Err(ServiceError::IntegrityViolation {
                kind: self.kind,
                violation,
            }),
            None => Ok(self),
        }
    }
}

pub struct IntegrityAuditor<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> IntegrityAuditor<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Verify one whole ledger from genesis
    pub async fn audit(&self, kind: LedgerKind) -> ServiceResult<IntegrityReport> {
        let records = LedgerRepo::all(self.ctx.db().pool(), kind).await?;
        let chain = validate_chain_from(GENESIS_PREV_HASH, &records);

        let report = IntegrityReport {
            kind,
            total: chain.total,
            checked: chain.checked,
            violation: chain.violation,
        };

        match &report.violation {
            Some(violation) => error!(
                kind = %kind,
                index = violation.index,
                record_id = %violation.record_id,
                "Chain integrity violation: {}",
                violation
            ),
            None => info!(kind = %kind, total = report.total, "Chain verified"),
        }

        Ok(report)
    }

    /// Verify every ledger
    pub async fn audit_all(&self) -> ServiceResult<Vec<IntegrityReport>> {
        let mut reports = Vec::with_capacity(LedgerKind::ALL.len());
        for kind in LedgerKind::ALL {
            reports.push(self.audit(kind).await?);
        }
        Ok(reports)
    }
}
