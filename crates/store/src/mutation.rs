//! Business mutations applied in the same transaction as their ledger record
//!
//! Preconditions are checked again here, on the write transaction's own
//! connection, so a change that was valid when the caller looked but lost a
//! race is rejected instead of applied twice.

use crate::error::{StoreError, StoreResult};
use crate::repos::{TransactionRepo, UserRepo};
use chrono::{DateTime, Utc};
use ledgerseal_ledger::{LedgerError, Transaction, TransactionStatus, User, UserStatus};
use sqlx::SqliteConnection;

/// Change to a business table that a ledger record describes
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertUser(User),
    UpdateUser(User),
    /// Applies only while the user is still in `from`
    SetUserStatus {
        id: String,
        from: UserStatus,
        to: UserStatus,
        at: DateTime<Utc>,
    },
    DeleteUser {
        id: String,
    },
    /// Applies only while the owning user is active
    InsertTransaction(Transaction),
    /// Applies only while the transaction is still in `from`
    SetTransactionStatus {
        id: String,
        from: TransactionStatus,
        to: TransactionStatus,
        at: DateTime<Utc>,
    },
}

impl Mutation {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertUser(_) => "insert_user",
            Mutation::UpdateUser(_) => "update_user",
            Mutation::SetUserStatus { .. } => "set_user_status",
            Mutation::DeleteUser { .. } => "delete_user",
            Mutation::InsertTransaction(_) => "insert_transaction",
            Mutation::SetTransactionStatus { .. } => "set_transaction_status",
        }
    }

    pub async fn apply(&self, conn: &mut SqliteConnection) -> StoreResult<()> {
        match self {
            Mutation::InsertUser(user) => UserRepo::insert(conn, user).await,
            Mutation::UpdateUser(user) => UserRepo::update(conn, user).await,
            Mutation::SetUserStatus { id, from, to, at } => {
                if UserRepo::set_status(&mut *conn, id, *from, *to, *at).await? {
                    return Ok(());
                }
                let current = UserRepo::get(&mut *conn, id).await?;
                Err(StoreError::Rejected(LedgerError::InvalidTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                }))
            }
            Mutation::DeleteUser { id } => UserRepo::delete(conn, id).await,
            Mutation::InsertTransaction(tx) => {
                let owner = UserRepo::get(&mut *conn, &tx.user_id).await?;
                if !owner.is_active() {
                    return Err(StoreError::Rejected(LedgerError::InvalidField {
                        field: "user_id",
                        reason: format!("user {} is {}", owner.id, owner.status),
                    }));
                }
                TransactionRepo::insert(conn, tx).await
            }
            Mutation::SetTransactionStatus { id, from, to, at } => {
                if TransactionRepo::set_status(&mut *conn, id, *from, *to, *at).await? {
                    return Ok(());
                }
                let current = TransactionRepo::get(&mut *conn, id).await?;
                Err(StoreError::Rejected(LedgerError::InvalidTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                }))
            }
        }
    }
}
