//! Database schema and row types
//!
//! Both ledger tables share one shape. Timestamps are stored as fixed-width
//! RFC 3339 text (microseconds, `Z`) so the stored `created_at` is byte-for-byte
//! the value that was hashed, and text ordering equals time ordering.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use ledgerseal_chain::{parse_stamp, Fields};
use ledgerseal_ledger::{
    Action, ActorType, LedgerKind, LedgerRecord, Transaction, TransactionStatus, User, UserStatus,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// DDL for one ledger table
///
/// `prev_hash` is unique: two writers that read the same tail cannot both
/// commit. The triggers make the table append-only for application paths.
pub fn ledger_ddl(kind: LedgerKind) -> Vec<String> {
    let table = kind.table();
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                sequence INTEGER NOT NULL UNIQUE,
                subject_id TEXT NOT NULL,
                action TEXT NOT NULL,
                actor_type TEXT NOT NULL,
                reason_code TEXT NOT NULL,
                policy_version TEXT NOT NULL,
                region TEXT,
                subsystem TEXT,
                details TEXT NOT NULL DEFAULT '{{}}',
                created_at TEXT NOT NULL,
                prev_hash TEXT NOT NULL UNIQUE,
                curr_hash TEXT NOT NULL UNIQUE
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_subject ON {table}(subject_id, sequence)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_created ON {table}(created_at)"),
        format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {table}_no_update
            BEFORE UPDATE ON {table}
            BEGIN
                SELECT RAISE(ABORT, '{table} is append-only');
            END
            "#
        ),
        format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {table}_no_delete
            BEFORE DELETE ON {table}
            BEGIN
                SELECT RAISE(ABORT, '{table} is append-only');
            END
            "#
        ),
    ]
}

pub const USERS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        region TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

pub const TRANSACTIONS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount TEXT NOT NULL,
        currency TEXT NOT NULL,
        region TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

pub const TRANSACTIONS_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)";

fn stamp(table: &str, field: &'static str, value: &str) -> StoreResult<DateTime<Utc>> {
    parse_stamp(value).map_err(|_| StoreError::corrupt(table, field, value))
}

/// Row type for the `account_history` / `transaction_ledger` tables
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    pub id: String,
    pub sequence: i64,
    pub subject_id: String,
    pub action: String,
    pub actor_type: String,
    pub reason_code: String,
    pub policy_version: String,
    pub region: Option<String>,
    pub subsystem: Option<String>,
    pub details: String,
    pub created_at: String,
    pub prev_hash: String,
    pub curr_hash: String,
}

impl LedgerRow {
    pub fn into_record(self, kind: LedgerKind) -> StoreResult<LedgerRecord> {
        let table = kind.table();
        let sequence = u64::try_from(self.sequence)
            .map_err(|_| StoreError::corrupt(table, "sequence", self.sequence))?;
        let details: Fields = serde_json::from_str(&self.details)?;

        Ok(LedgerRecord {
            id: self.id,
            kind,
            sequence,
            subject_id: self.subject_id,
            action: Action::parse(&self.action)?,
            actor_type: ActorType::parse(&self.actor_type)?,
            reason_code: self.reason_code,
            policy_version: self.policy_version,
            region: self.region,
            subsystem: self.subsystem,
            details,
            created_at: stamp(table, "created_at", &self.created_at)?,
            prev_hash: self.prev_hash,
            curr_hash: self.curr_hash,
        })
    }
}

/// Row type for the `users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub region: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            status: UserStatus::parse(&row.status)?,
            created_at: stamp("users", "created_at", &row.created_at)?,
            updated_at: stamp("users", "updated_at", &row.updated_at)?,
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            region: row.region,
        })
    }
}

/// Row type for the `transactions` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub amount: String, // Decimal stored as TEXT
    pub currency: String,
    pub region: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> StoreResult<Self> {
        let amount = Decimal::from_str(&row.amount)
            .map_err(|_| StoreError::corrupt("transactions", "amount", &row.amount))?;

        Ok(Transaction {
            amount,
            status: TransactionStatus::parse(&row.status)?,
            created_at: stamp("transactions", "created_at", &row.created_at)?,
            updated_at: stamp("transactions", "updated_at", &row.updated_at)?,
            id: row.id,
            user_id: row.user_id,
            currency: row.currency,
            region: row.region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> LedgerRow {
        LedgerRow {
            id: "r1".into(),
            sequence: 1,
            subject_id: "u1".into(),
            action: "create".into(),
            actor_type: "system".into(),
            reason_code: "USER_CREATED".into(),
            policy_version: "v1.0.0".into(),
            region: Some("eu-west".into()),
            subsystem: None,
            details: r#"{"email":"ada@example.com"}"#.into(),
            created_at: "2026-01-02T03:04:05.123456Z".into(),
            prev_hash: String::new(),
            curr_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn test_ledger_row_into_record() {
        let record = row().into_record(LedgerKind::AccountHistory).unwrap();
        assert_eq!(record.action, Action::Create);
        assert_eq!(record.sequence, 1);
        assert_eq!(record.details["email"], "ada@example.com");
        assert_eq!(
            ledgerseal_chain::format_stamp(&record.created_at),
            "2026-01-02T03:04:05.123456Z"
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let mut bad = row();
        bad.action = "erase".into();
        assert!(matches!(
            bad.into_record(LedgerKind::AccountHistory),
            Err(StoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_negative_sequence_is_corrupt() {
        let mut bad = row();
        bad.sequence = -1;
        assert!(matches!(
            bad.into_record(LedgerKind::AccountHistory),
            Err(StoreError::Corrupt { field: "sequence", .. })
        ));
    }

    #[test]
    fn test_ddl_names_table() {
        let ddl = ledger_ddl(LedgerKind::TransactionLedger);
        assert!(ddl[0].contains("CREATE TABLE IF NOT EXISTS transaction_ledger"));
        assert!(ddl[0].contains("prev_hash TEXT NOT NULL UNIQUE"));
        assert!(ddl.iter().any(|s| s.contains("transaction_ledger_no_update")));
    }
}
