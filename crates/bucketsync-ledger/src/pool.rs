//! SQLite connection pool and migration runner.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Thin wrapper around a `SqlitePool`, opened with the WAL journal mode and
/// a busy timeout.
#[derive(Debug, Clone)]
pub struct LedgerPool {
    pool: SqlitePool,
}

impl LedgerPool {
    /// Opens (creating if necessary) a SQLite database at `db_path` and
    /// runs migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Opens an in-memory database for tests.
    ///
    /// # Errors
    /// Returns an error if the in-memory database or migrations fail.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::raw_sql(include_str!("migrations/0001_ledger.sql"))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
