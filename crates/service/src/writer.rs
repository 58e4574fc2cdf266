//! Chain writer
//!
//! The only path that appends to a ledger. "Read tail, seal, insert" runs
//! under the ledger's own async lock, inside one database transaction shared
//! with the business mutation the record describes.
//!
//! The lock only covers this process. Another process (or another `Database`
//! handle on the same file) shows up as `SQLITE_BUSY`/`SQLITE_LOCKED` or as a
//! `UNIQUE(prev_hash)` rejection; both roll the attempt back and retry from a
//! fresh tail, a bounded number of times.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use ledgerseal_guard::Authorization;
use ledgerseal_ledger::{Action, ActorType, LedgerError, LedgerKind, LedgerRecord, RecordDraft};
use ledgerseal_store::{ChainTail, Database, LedgerRepo, Mutation, StoreError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Compliance metadata every write must carry. Nothing here is inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Justification {
    pub actor_type: ActorType,
    pub reason_code: String,
    pub policy_version: String,
}

impl Justification {
    pub fn new(
        actor_type: ActorType,
        reason_code: impl Into<String>,
        policy_version: impl Into<String>,
    ) -> Self {
        Self {
            actor_type,
            reason_code: reason_code.into(),
            policy_version: policy_version.into(),
        }
    }

    /// Start a draft for `action` on `subject_id`
    pub fn draft(&self, subject_id: impl Into<String>, action: Action) -> RecordDraft {
        RecordDraft::new(
            subject_id,
            action,
            self.actor_type,
            self.reason_code.clone(),
            self.policy_version.clone(),
        )
    }
}

/// One tail lock per ledger table
#[derive(Debug, Default)]
struct TailLocks {
    account_history: Mutex<()>,
    transaction_ledger: Mutex<()>,
}

impl TailLocks {
    fn get(&self, kind: LedgerKind) -> &Mutex<()> {
        match kind {
            LedgerKind::AccountHistory => &self.account_history,
            LedgerKind::TransactionLedger => &self.transaction_ledger,
        }
    }
}

/// Appends hash-chained records. Clones share the same tail locks.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    db: Database,
    config: ServiceConfig,
    locks: Arc<TailLocks>,
}

impl LedgerWriter {
    pub fn new(db: Database, config: ServiceConfig) -> Self {
        Self {
            db,
            config,
            locks: Arc::new(TailLocks::default()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Record a non-destructive mutation on its own
    pub async fn record_mutation(
        &self,
        kind: LedgerKind,
        subject_id: &str,
        action: Action,
        actor_type: ActorType,
        reason_code: &str,
        policy_version: &str,
    ) -> ServiceResult<LedgerRecord> {
        let draft = RecordDraft::new(subject_id, action, actor_type, reason_code, policy_version);
        self.commit(kind, draft, None).await
    }

    /// Record a destructive action that has already passed the guard
    #[allow(clippy::too_many_arguments)]
    pub async fn record_destructive(
        &self,
        authorization: &Authorization,
        kind: LedgerKind,
        subject_id: &str,
        action: Action,
        actor_type: ActorType,
        reason_code: &str,
        policy_version: &str,
    ) -> ServiceResult<LedgerRecord> {
        let draft = RecordDraft::new(subject_id, action, actor_type, reason_code, policy_version);
        self.commit_authorized(authorization, kind, draft, None).await
    }

    /// Append a record, applying `mutation` in the same transaction.
    /// Destructive actions are refused here; see [`commit_authorized`](Self::commit_authorized).
    pub async fn commit(
        &self,
        kind: LedgerKind,
        draft: RecordDraft,
        mutation: Option<Mutation>,
    ) -> ServiceResult<LedgerRecord> {
        if draft.action.is_destructive() {
            return Err(LedgerError::RequiresAuthorization(draft.action.to_string()).into());
        }
        self.write(kind, draft, mutation).await
    }

    /// [`commit`](Self::commit) for actions behind dual control. The
    /// authorizing operator is hashed into the record's details.
    pub async fn commit_authorized(
        &self,
        authorization: &Authorization,
        kind: LedgerKind,
        draft: RecordDraft,
        mutation: Option<Mutation>,
    ) -> ServiceResult<LedgerRecord> {
        let draft = draft.detail("authorized_by", authorization.operator_identity());
        self.write(kind, draft, mutation).await
    }

    async fn write(
        &self,
        kind: LedgerKind,
        draft: RecordDraft,
        mutation: Option<Mutation>,
    ) -> ServiceResult<LedgerRecord> {
        draft.validate(kind)?;

        // 1. Serialize on this ledger's tail, bounded wait
        let _tail = tokio::time::timeout(self.config.lock_timeout(), self.locks.get(kind).lock())
            .await
            .map_err(|_| {
                warn!(kind = %kind, waited_ms = self.config.lock_timeout_ms, "Tail lock timed out");
                ServiceError::LockTimeout {
                    kind,
                    waited_ms: self.config.lock_timeout_ms,
                }
            })?;

        // 2. Attempt; a conflict means the tail moved, so start over from a fresh read
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_write(kind, draft.clone(), mutation.as_ref()).await {
                Ok(record) => {
                    info!(
                        kind = %kind,
                        sequence = record.sequence,
                        subject_id = %record.subject_id,
                        action = %record.action,
                        "Ledger record committed"
                    );
                    return Ok(record);
                }
                Err(ServiceError::Persistence(e)) if e.is_contention_on(kind.table()) => {
                    if attempt > self.config.max_write_retries {
                        warn!(kind = %kind, attempts = attempt, "Giving up on chain write");
                        return Err(ServiceError::ChainWriteConflict {
                            kind,
                            attempts: attempt,
                        });
                    }
                    warn!(kind = %kind, attempt, error = %e, "Chain tail moved, retrying");
                    tokio::time::sleep(self.config.retry_backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_write(
        &self,
        kind: LedgerKind,
        draft: RecordDraft,
        mutation: Option<&Mutation>,
    ) -> ServiceResult<LedgerRecord> {
        // 1. One transaction for mutation and record; dropping it rolls both back
        let mut tx = self.db.pool().begin().await.map_err(StoreError::from)?;

        // 2. Tail as seen by this transaction
        let tail = LedgerRepo::tail(&mut *tx, kind).await?;

        // 3. Seal (sequence, stamp, digests)
        let record = LedgerRecord::seal(
            kind,
            ChainTail::next_sequence(tail.as_ref()),
            ChainTail::prev_hash(tail.as_ref()),
            draft,
        )?;

        // 4. Business mutation
        if let Some(mutation) = mutation {
            mutation.apply(&mut tx).await?;
            debug!(mutation = mutation.name(), subject_id = %record.subject_id, "Mutation applied");
        }

        // 5. Append
        LedgerRepo::insert(&mut *tx, &record).await?;

        // 6. Commit. A failed commit is ambiguous, so check before reporting failure.
        if let Err(e) = tx.commit().await {
            return match LedgerRepo::get(self.db.pool(), kind, &record.id).await {
                Ok(stored) => {
                    warn!(kind = %kind, record_id = %stored.id, error = %e, "Commit reported failure but record is durable");
                    Ok(stored)
                }
                Err(_) => Err(StoreError::on_write(kind.table(), e).into()),
            };
        }

        Ok(record)
    }
}
