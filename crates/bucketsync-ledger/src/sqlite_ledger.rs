//! `SqliteLedger`: the `Ledger` port backed by a SQLite database.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use bucketsync_core::domain::newtypes::LocalPath;
use bucketsync_core::ports::Ledger;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::pool::LedgerPool;

/// SQLite-backed `Ledger` adapter.
///
/// All operations serialize through `write_lock`; on any unrecoverable
/// backing-store error the ledger flips `disposed` and every subsequent
/// call becomes a no-op — `exists` returns `false`, `pop_*` return empty
/// vectors, `mark_*`/`remove` silently do nothing.
pub struct SqliteLedger {
    pool: LedgerPool,
    write_lock: Mutex<()>,
    disposed: AtomicBool,
    fail_limit: u32,
}

impl SqliteLedger {
    /// Wraps an already-open `LedgerPool` with the given `failLimit`.
    #[must_use]
    pub fn new(pool: LedgerPool, fail_limit: u32) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
            disposed: AtomicBool::new(false),
            fail_limit,
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self, context: &str, error: &anyhow::Error) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            error!(%context, %error, "ledger backing store failed; disposing, further operations are no-ops");
        }
    }
}

fn path_key(path: &LocalPath) -> String {
    path.as_path().display().to_string()
}

fn parse_key(key: &str) -> Option<LocalPath> {
    LocalPath::new(PathBuf::from(key)).ok()
}

#[async_trait::async_trait]
impl Ledger for SqliteLedger {
    async fn mark_failed(&self, path: &LocalPath) {
        if self.is_disposed() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        let key = path_key(path);
        let result = sqlx::query(
            "INSERT INTO failed (path, attempts) VALUES (?, 1)
             ON CONFLICT(path) DO UPDATE SET attempts = attempts + 1",
        )
        .bind(&key)
        .execute(self.pool.pool())
        .await;

        match result {
            Ok(_) => warn!(path = %key, "marked failed"),
            Err(err) => self.dispose("mark_failed", &err.into()),
        }
    }

    async fn mark_succeeded(&self, path: &LocalPath) {
        if self.is_disposed() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        let key = path_key(path);

        let outcome: anyhow::Result<()> = async {
            let mut tx = self.pool.pool().begin().await?;
            sqlx::query("DELETE FROM failed WHERE path = ?")
                .bind(&key)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO succeeded (path) VALUES (?)
                 ON CONFLICT(path) DO NOTHING",
            )
            .bind(&key)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            self.dispose("mark_succeeded", &err);
        }
    }

    async fn exists(&self, path: &LocalPath) -> bool {
        if self.is_disposed() {
            return false;
        }
        let key = path_key(path);
        let row: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as(
            "SELECT 1 FROM succeeded WHERE path = ?
             UNION ALL
             SELECT 1 FROM failed WHERE path = ?
             LIMIT 1",
        )
        .bind(&key)
        .bind(&key)
        .fetch_optional(self.pool.pool())
        .await;

        match row {
            Ok(found) => found.is_some(),
            Err(err) => {
                self.dispose("exists", &err.into());
                false
            }
        }
    }

    async fn pop_failed(&self, limit: u32) -> Vec<LocalPath> {
        if self.is_disposed() {
            return Vec::new();
        }
        let rows: Result<Vec<(String,)>, sqlx::Error> = sqlx::query_as(
            "SELECT path FROM failed WHERE attempts < ? ORDER BY path LIMIT ?",
        )
        .bind(i64::from(self.fail_limit))
        .bind(i64::from(limit))
        .fetch_all(self.pool.pool())
        .await;

        match rows {
            Ok(rows) => rows.into_iter().filter_map(|(p,)| parse_key(&p)).collect(),
            Err(err) => {
                self.dispose("pop_failed", &err.into());
                Vec::new()
            }
        }
    }

    async fn pop_all(&self) -> Vec<LocalPath> {
        if self.is_disposed() {
            return Vec::new();
        }
        let rows: Result<Vec<(String,)>, sqlx::Error> = sqlx::query_as(
            "SELECT path FROM succeeded
             UNION ALL
             SELECT path FROM failed",
        )
        .fetch_all(self.pool.pool())
        .await;

        match rows {
            Ok(rows) => rows.into_iter().filter_map(|(p,)| parse_key(&p)).collect(),
            Err(err) => {
                self.dispose("pop_all", &err.into());
                Vec::new()
            }
        }
    }

    async fn remove(&self, path: &LocalPath) {
        if self.is_disposed() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        let key = path_key(path);

        let outcome: Result<(), sqlx::Error> = async {
            sqlx::query("DELETE FROM succeeded WHERE path = ?")
                .bind(&key)
                .execute(self.pool.pool())
                .await?;
            sqlx::query("DELETE FROM failed WHERE path = ?")
                .bind(&key)
                .execute(self.pool.pool())
                .await?;
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            self.dispose("remove", &err.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> SqliteLedger {
        let pool = LedgerPool::in_memory().await.unwrap();
        SqliteLedger::new(pool, 3)
    }

    fn path(s: &str) -> LocalPath {
        LocalPath::new(PathBuf::from(s)).unwrap()
    }

    #[tokio::test]
    async fn mark_failed_then_exists() {
        let ledger = ledger().await;
        let p = path("/root/b1/a.bin");
        ledger.mark_failed(&p).await;
        assert!(ledger.exists(&p).await);
    }

    #[tokio::test]
    async fn mark_failed_increments_attempts() {
        let ledger = ledger().await;
        let p = path("/root/b1/a.bin");
        ledger.mark_failed(&p).await;
        ledger.mark_failed(&p).await;
        ledger.mark_failed(&p).await;
        // fail_limit = 3, so attempts=3 excludes it from pop_failed.
        let popped = ledger.pop_failed(10).await;
        assert!(popped.is_empty());
    }

    #[tokio::test]
    async fn mark_succeeded_after_failed_leaves_one_row() {
        let ledger = ledger().await;
        let p = path("/root/b1/a.bin");
        ledger.mark_failed(&p).await;
        ledger.mark_succeeded(&p).await;

        assert!(ledger.exists(&p).await);
        let all = ledger.pop_all().await;
        assert_eq!(all.len(), 1);
        let failed = ledger.pop_failed(10).await;
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn remove_then_exists_false() {
        let ledger = ledger().await;
        let p = path("/root/b1/a.bin");
        ledger.mark_failed(&p).await;
        ledger.remove(&p).await;
        assert!(!ledger.exists(&p).await);
    }

    #[tokio::test]
    async fn pop_failed_respects_limit_and_order() {
        let ledger = ledger().await;
        for name in ["a", "b", "c"] {
            ledger.mark_failed(&path(&format!("/root/b1/{name}.bin"))).await;
        }
        let popped = ledger.pop_failed(2).await;
        assert_eq!(popped.len(), 2);
    }

    #[tokio::test]
    async fn enqueue_same_path_twice_is_single_entry() {
        let ledger = ledger().await;
        let p = path("/root/b1/a.bin");
        ledger.mark_failed(&p).await;
        ledger.mark_failed(&p).await;
        let all = ledger.pop_all().await;
        assert_eq!(all.len(), 1);
    }
}
