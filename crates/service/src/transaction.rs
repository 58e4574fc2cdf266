//! Transaction service - payment lifecycle recorded in `transaction_ledger`

use crate::context::ServiceContext;
use crate::error::ServiceResult;
use crate::writer::Justification;
use chrono::Utc;
use ledgerseal_guard::AuthorizationHeaders;
use ledgerseal_ledger::{
    Action, LedgerError, LedgerKind, LedgerRecord, RecordDraft, Transaction, TransactionStatus,
};
use ledgerseal_store::{Mutation, TransactionRepo, UserRepo};

const SUBSYSTEM: &str = "payments";

pub struct TransactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransactionService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get_transaction(&self, tx_id: &str) -> ServiceResult<Transaction> {
        Ok(TransactionRepo::get(self.ctx.db().pool(), tx_id).await?)
    }

    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Transaction>> {
        Ok(TransactionRepo::list_by_user(self.ctx.db().pool(), user_id).await?)
    }

    /// Insert a pending transaction and its `append` record
    pub async fn open_transaction(
        &self,
        tx: Transaction,
        why: &Justification,
    ) -> ServiceResult<(Transaction, LedgerRecord)> {
        tx.validate()?;
        if tx.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidField {
                field: "status",
                reason: format!("new transactions start pending, got {}", tx.status),
            }
            .into());
        }

        // Fail fast; the write transaction checks the owner again
        let user = UserRepo::get(self.ctx.db().pool(), &tx.user_id).await?;
        if !user.is_active() {
            return Err(LedgerError::InvalidField {
                field: "user_id",
                reason: format!("user {} is {}", user.id, user.status),
            }
            .into());
        }

        let draft = self
            .draft(&tx, Action::Append, why)
            .detail("user_id", tx.user_id.as_str());
        let record = self
            .ctx
            .writer()
            .commit(
                LedgerKind::TransactionLedger,
                draft,
                Some(Mutation::InsertTransaction(tx.clone())),
            )
            .await?;
        Ok((tx, record))
    }

    /// Move to a non-destructive status (pending / completed / failed / cancelled)
    pub async fn set_status(
        &self,
        tx_id: &str,
        status: TransactionStatus,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        let action = status.ledger_action();
        if action.is_destructive() {
            return Err(LedgerError::RequiresAuthorization(action.to_string()).into());
        }

        let tx = self.get_transaction(tx_id).await?;
        tx.check_transition(status)?;

        let draft = self.draft(&tx, action, why).detail("from_status", tx.status.to_string());
        self.ctx
            .writer()
            .commit(
                LedgerKind::TransactionLedger,
                draft,
                Some(Self::status_change(&tx, status)),
            )
            .await
    }

    /// Guarded: completed -> refunded
    pub async fn refund(
        &self,
        headers: &AuthorizationHeaders,
        tx_id: &str,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        self.guarded_status(headers, tx_id, TransactionStatus::Refunded, why)
            .await
    }

    /// Guarded: pending / completed -> rolled back
    pub async fn rollback(
        &self,
        headers: &AuthorizationHeaders,
        tx_id: &str,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        self.guarded_status(headers, tx_id, TransactionStatus::RolledBack, why)
            .await
    }

    async fn guarded_status(
        &self,
        headers: &AuthorizationHeaders,
        tx_id: &str,
        status: TransactionStatus,
        why: &Justification,
    ) -> ServiceResult<LedgerRecord> {
        let action = status.ledger_action();

        // 1. Dual control before anything else
        let authorization = self.ctx.authorize(headers, action, tx_id)?;

        // 2. Lifecycle check; repeated inside the write transaction
        let tx = self.get_transaction(tx_id).await?;
        tx.check_transition(status)?;

        // 3. Status change + record, one transaction
        let draft = self.draft(&tx, action, why).detail("from_status", tx.status.to_string());
        self.ctx
            .writer()
            .commit_authorized(
                &authorization,
                LedgerKind::TransactionLedger,
                draft,
                Some(Self::status_change(&tx, status)),
            )
            .await
    }

    fn draft(&self, tx: &Transaction, action: Action, why: &Justification) -> RecordDraft {
        let mut draft = why
            .draft(&tx.id, action)
            .subsystem(SUBSYSTEM)
            .detail("amount", tx.amount.to_string())
            .detail("currency", tx.currency.as_str());
        if let Some(region) = &tx.region {
            draft = draft.region(region.as_str());
        }
        draft
    }

    /// Applies only if `tx` is still in the status it was read with
    fn status_change(tx: &Transaction, to: TransactionStatus) -> Mutation {
        Mutation::SetTransactionStatus {
            id: tx.id.clone(),
            from: tx.status,
            to,
            at: Utc::now(),
        }
    }
}
