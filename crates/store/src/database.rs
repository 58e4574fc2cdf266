//! Connection pool and schema setup

use crate::error::StoreResult;
use crate::schema::{ledger_ddl, TRANSACTIONS_DDL, TRANSACTIONS_INDEX_DDL, USERS_DDL};
use ledgerseal_ledger::LedgerKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Handle to the SQLite database
///
/// SQLite admits one writer at a time, so the pool keeps a single connection.
/// Write transactions queue on it instead of failing with `SQLITE_BUSY`.
/// The connection is never recycled: for `sqlite::memory:` a fresh one would
/// be a new, empty database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) a database file and initialise the schema
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect_with(options).await
    }

    /// Connect by URL, e.g. `sqlite://ledger.db` or `sqlite::memory:`
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Self::connect_with(options).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Connect with explicit options (busy timeout, journal mode, ...)
    pub async fn connect_with(options: SqliteConnectOptions) -> StoreResult<Self> {
        let pool = pool_options().connect_with(options).await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create tables, indexes and triggers if they do not exist
    pub async fn init_schema(&self) -> StoreResult<()> {
        for kind in LedgerKind::ALL {
            for statement in ledger_ddl(kind) {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
            debug!(table = kind.table(), "Ledger table ready");
        }

        sqlx::query(USERS_DDL).execute(&self.pool).await?;
        sqlx::query(TRANSACTIONS_DDL).execute(&self.pool).await?;
        sqlx::query(TRANSACTIONS_INDEX_DDL).execute(&self.pool).await?;

        info!("Database schema initialised");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}
