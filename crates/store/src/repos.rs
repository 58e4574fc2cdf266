//! Repository implementations for SQLite
//!
//! Every function takes an executor so the same call works against the pool
//! for plain reads and against `&mut *tx` inside a write transaction.

use crate::error::{StoreError, StoreResult};
use crate::filter::RecordFilter;
use crate::schema::{LedgerRow, TransactionRow, UserRow};
use chrono::{DateTime, Utc};
use ledgerseal_chain::{format_stamp, GENESIS_PREV_HASH};
use ledgerseal_ledger::{LedgerKind, LedgerRecord, Transaction, TransactionStatus, User, UserStatus};
use serde_json::Value;
use sqlx::{Executor, QueryBuilder, Sqlite};

// ============================================================================
// Ledger Repository
// ============================================================================

const LEDGER_COLUMNS: &str = "id, sequence, subject_id, action, actor_type, reason_code, \
     policy_version, region, subsystem, details, created_at, prev_hash, curr_hash";

/// Last committed link of a ledger chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTail {
    pub sequence: u64,
    pub curr_hash: String,
}

impl ChainTail {
    pub fn next_sequence(tail: Option<&ChainTail>) -> u64 {
        tail.map_or(1, |t| t.sequence + 1)
    }

    pub fn prev_hash(tail: Option<&ChainTail>) -> &str {
        tail.map_or(GENESIS_PREV_HASH, |t| t.curr_hash.as_str())
    }
}

/// Repository for the `account_history` and `transaction_ledger` tables
pub struct LedgerRepo;

impl LedgerRepo {
    /// Current chain tail, `None` for an empty ledger
    pub async fn tail<'e, E>(executor: E, kind: LedgerKind) -> StoreResult<Option<ChainTail>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT sequence, curr_hash FROM {} ORDER BY sequence DESC LIMIT 1",
            kind.table()
        );
        let row: Option<(i64, String)> = sqlx::query_as(&sql).fetch_optional(executor).await?;

        row.map(|(sequence, curr_hash)| {
            let sequence = u64::try_from(sequence)
                .map_err(|_| StoreError::corrupt(kind.table(), "sequence", sequence))?;
            Ok(ChainTail {
                sequence,
                curr_hash,
            })
        })
        .transpose()
    }

    /// Insert a sealed record. A stale tail surfaces as [`StoreError::Conflict`].
    pub async fn insert<'e, E>(executor: E, record: &LedgerRecord) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let table = record.kind.table();
        let sql = format!(
            "INSERT INTO {table} ({LEDGER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let sequence = i64::try_from(record.sequence)
            .map_err(|_| StoreError::corrupt(table, "sequence", record.sequence))?;
        let details = serde_json::to_string(&Value::Object(record.details.clone()))?;

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(sequence)
            .bind(&record.subject_id)
            .bind(record.action.to_string())
            .bind(record.actor_type.to_string())
            .bind(&record.reason_code)
            .bind(&record.policy_version)
            .bind(&record.region)
            .bind(&record.subsystem)
            .bind(details)
            .bind(format_stamp(&record.created_at))
            .bind(&record.prev_hash)
            .bind(&record.curr_hash)
            .execute(executor)
            .await
            .map_err(|e| StoreError::on_write(table, e))?;
        Ok(())
    }

    /// Get one record by id
    pub async fn get<'e, E>(executor: E, kind: LedgerKind, id: &str) -> StoreResult<LedgerRecord>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM {} WHERE id = ?", kind.table());
        sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StoreError::not_found(kind.table(), id))?
            .into_record(kind)
    }

    /// Records for one subject in creation order
    pub async fn history<'e, E>(
        executor: E,
        kind: LedgerKind,
        subject_id: &str,
    ) -> StoreResult<Vec<LedgerRecord>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM {} WHERE subject_id = ? ORDER BY sequence ASC",
            kind.table()
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(subject_id)
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(|r| r.into_record(kind)).collect()
    }

    /// The whole chain in sequence order
    pub async fn all<'e, E>(executor: E, kind: LedgerKind) -> StoreResult<Vec<LedgerRecord>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM {} ORDER BY sequence ASC",
            kind.table()
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(|r| r.into_record(kind)).collect()
    }

    /// Filtered read in sequence order
    pub async fn search<'e, E>(
        executor: E,
        kind: LedgerKind,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<LedgerRecord>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {LEDGER_COLUMNS} FROM {}",
            kind.table()
        ));
        filter.push_sql(&mut qb);

        let rows = qb
            .build_query_as::<LedgerRow>()
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(|r| r.into_record(kind)).collect()
    }

    pub async fn count<'e, E>(executor: E, kind: LedgerKind) -> StoreResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(executor).await?;
        Ok(count.max(0) as u64)
    }
}

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the `users` table
pub struct UserRepo;

impl UserRepo {
    pub async fn get<'e, E>(executor: E, id: &str) -> StoreResult<User>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StoreError::not_found("User", id))?
            .try_into()
    }

    pub async fn list<'e, E>(executor: E) -> StoreResult<Vec<User>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn insert<'e, E>(executor: E, user: &User) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, region, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.region)
        .bind(user.status.to_string())
        .bind(format_stamp(&user.created_at))
        .bind(format_stamp(&user.updated_at))
        .execute(executor)
        .await
        .map_err(|e| StoreError::on_write("users", e))?;
        Ok(())
    }

    /// Overwrite the editable profile fields
    pub async fn update<'e, E>(executor: E, user: &User) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE users SET email = ?, display_name = ?, region = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.region)
        .bind(format_stamp(&user.updated_at))
        .bind(&user.id)
        .execute(executor)
        .await
        .map_err(|e| StoreError::on_write("users", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", &user.id));
        }
        Ok(())
    }

    /// Compare-and-set the status. `false` when the user is missing or no
    /// longer in `from`.
    pub async fn set_status<'e, E>(
        executor: E,
        id: &str,
        from: UserStatus,
        to: UserStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE users SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.to_string())
        .bind(format_stamp(&at))
        .bind(id)
        .bind(from.to_string())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn delete<'e, E>(executor: E, id: &str) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", id));
        }
        Ok(())
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for the `transactions` table
pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn get<'e, E>(executor: E, id: &str) -> StoreResult<Transaction>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| StoreError::not_found("Transaction", id))?
            .try_into()
    }

    pub async fn list_by_user<'e, E>(executor: E, user_id: &str) -> StoreResult<Vec<Transaction>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    pub async fn insert<'e, E>(executor: E, tx: &Transaction) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "INSERT INTO transactions (id, user_id, amount, currency, region, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.id)
        .bind(&tx.user_id)
        .bind(tx.amount.to_string())
        .bind(&tx.currency)
        .bind(&tx.region)
        .bind(tx.status.to_string())
        .bind(format_stamp(&tx.created_at))
        .bind(format_stamp(&tx.updated_at))
        .execute(executor)
        .await
        .map_err(|e| StoreError::on_write("transactions", e))?;
        Ok(())
    }

    /// Compare-and-set the status. `false` when the transaction is missing
    /// or no longer in `from`.
    pub async fn set_status<'e, E>(
        executor: E,
        id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.to_string())
        .bind(format_stamp(&at))
        .bind(id)
        .bind(from.to_string())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
