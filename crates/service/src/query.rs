//! Ledger reads. Pure queries: no validation, no writes.

use crate::context::ServiceContext;
use crate::error::ServiceResult;
use ledgerseal_ledger::{LedgerKind, LedgerRecord};
use ledgerseal_store::{LedgerRepo, RecordFilter};

pub struct LedgerQuery<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerQuery<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Records for a subject in creation order
    pub async fn get_history(
        &self,
        kind: LedgerKind,
        subject_id: &str,
    ) -> ServiceResult<Vec<LedgerRecord>> {
        Ok(LedgerRepo::history(self.ctx.db().pool(), kind, subject_id).await?)
    }

    /// Records matching region / subsystem / date range / action, in sequence order
    pub async fn search(
        &self,
        kind: LedgerKind,
        filter: &RecordFilter,
    ) -> ServiceResult<Vec<LedgerRecord>> {
        Ok(LedgerRepo::search(self.ctx.db().pool(), kind, filter).await?)
    }

    pub async fn get_record(&self, kind: LedgerKind, record_id: &str) -> ServiceResult<LedgerRecord> {
        Ok(LedgerRepo::get(self.ctx.db().pool(), kind, record_id).await?)
    }

    pub async fn count(&self, kind: LedgerKind) -> ServiceResult<u64> {
        Ok(LedgerRepo::count(self.ctx.db().pool(), kind).await?)
    }
}
