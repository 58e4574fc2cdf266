//! Store errors

use ledgerseal_ledger::LedgerError;
use thiserror::Error;

// Primary result codes; extended codes keep them in the low byte
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write (chain tail moved, duplicate id)
    #[error("Write conflict on {table}: {detail}")]
    Conflict { table: String, detail: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] LedgerError),

    /// A business rule re-checked inside the write transaction failed
    #[error("Rejected: {0}")]
    Rejected(LedgerError),

    #[error("Corrupt {field} in {table}: {value}")]
    Corrupt {
        table: String,
        field: &'static str,
        value: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for StoreError
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn corrupt(table: &str, field: &'static str, value: impl ToString) -> Self {
        Self::Corrupt {
            table: table.to_string(),
            field,
            value: value.to_string(),
        }
    }

    /// Classify a failed write: unique violations become [`StoreError::Conflict`]
    pub fn on_write(table: &str, err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Self::Conflict {
                table: table.to_string(),
                detail: db_err.message().to_string(),
            },
            _ => Self::Database(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether this is a unique-constraint rejection on `table`
    pub fn is_conflict_on(&self, table: &str) -> bool {
        matches!(self, Self::Conflict { table: t, .. } if t == table)
    }

    /// SQLite reported the database busy or locked: another connection holds
    /// the write lock
    pub fn is_busy(&self) -> bool {
        let Self::Database(err) = self else {
            return false;
        };
        err.as_database_error()
            .and_then(|db_err| db_err.code())
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false)
    }

    /// Another writer got to `table` first, in this process or another one
    pub fn is_contention_on(&self, table: &str) -> bool {
        self.is_conflict_on(table) || self.is_busy()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
