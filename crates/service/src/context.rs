//! Service context - wires database, guard and writer together

use crate::account::AccountService;
use crate::audit::IntegrityAuditor;
use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::query::LedgerQuery;
use crate::transaction::TransactionService;
use crate::writer::LedgerWriter;
use ledgerseal_guard::{Authorization, AuthorizationHeaders, DualControlGuard};
use ledgerseal_ledger::Action;
use ledgerseal_store::Database;
use tracing::{info, warn};

/// Shared state for all ledger services. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    db: Database,
    guard: DualControlGuard,
    writer: LedgerWriter,
}

impl ServiceContext {
    pub fn new(db: Database, guard: DualControlGuard, config: ServiceConfig) -> Self {
        let writer = LedgerWriter::new(db.clone(), config);
        Self { db, guard, writer }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn guard(&self) -> &DualControlGuard {
        &self.guard
    }

    pub fn writer(&self) -> &LedgerWriter {
        &self.writer
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self)
    }

    pub fn transactions(&self) -> TransactionService<'_> {
        TransactionService::new(self)
    }

    pub fn query(&self) -> LedgerQuery<'_> {
        LedgerQuery::new(self)
    }

    pub fn auditor(&self) -> IntegrityAuditor<'_> {
        IntegrityAuditor::new(self)
    }

    /// Run the dual-control check for a destructive action.
    ///
    /// The guard itself stays silent; the attempt is logged here.
    pub(crate) fn authorize(
        &self,
        headers: &AuthorizationHeaders,
        action: Action,
        subject_id: &str,
    ) -> ServiceResult<Authorization> {
        match self.guard.validate_destructive_action(headers) {
            Ok(authorization) => {
                info!(
                    action = %action,
                    subject_id,
                    operator = authorization.operator_identity(),
                    "Destructive action authorized"
                );
                Ok(authorization)
            }
            Err(rejection) => {
                warn!(
                    action = %action,
                    subject_id,
                    code = rejection.code(),
                    "Destructive action rejected"
                );
                Err(rejection.into())
            }
        }
    }
}
