//! Ledger maintenance service
//!
//! Periodically reconciles the ledger against the filesystem: anything the
//! ledger still tracks that no longer exists on disk, or that no longer
//! lies under the watched root, is tombstoned. A thin callback registered
//! with [`crate::periodic::PeriodicService`].

use std::sync::Arc;

use tracing::debug;

use bucketsync_core::domain::newtypes::LocalPath;
use bucketsync_core::ports::Ledger;

/// One ledger-maintenance tick: `ledger.pop_all()`, then
/// `ledger.remove(path)` for every path not present on disk or not prefixed
/// by `watch_root`.
pub async fn run_once(watch_root: &LocalPath, ledger: &Arc<dyn Ledger>) {
    for path in ledger.pop_all().await {
        let stale = !path.as_path().exists() || !path.is_within(watch_root);
        if stale {
            debug!(path = %path, "ledger maintenance: removing stale row");
            ledger.remove(&path).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct FakeLedger {
        rows: StdMutex<Vec<LocalPath>>,
        removed: StdMutex<Vec<LocalPath>>,
    }

    #[async_trait::async_trait]
    impl Ledger for FakeLedger {
        async fn mark_failed(&self, _path: &LocalPath) {}
        async fn mark_succeeded(&self, _path: &LocalPath) {}
        async fn exists(&self, _path: &LocalPath) -> bool {
            false
        }
        async fn pop_failed(&self, _limit: u32) -> Vec<LocalPath> {
            vec![]
        }
        async fn pop_all(&self) -> Vec<LocalPath> {
            self.rows.lock().unwrap().clone()
        }
        async fn remove(&self, path: &LocalPath) {
            self.removed.lock().unwrap().push(path.clone());
        }
    }

    #[tokio::test]
    async fn removes_rows_whose_file_no_longer_exists() {
        let dir = tempfile::tempdir().unwrap();
        let watch_root = LocalPath::new(dir.path().to_path_buf()).unwrap();
        let missing = LocalPath::new(dir.path().join("gone.bin")).unwrap();

        let concrete = Arc::new(FakeLedger {
            rows: StdMutex::new(vec![missing.clone()]),
            removed: StdMutex::new(vec![]),
        });
        let ledger: Arc<dyn Ledger> = concrete.clone();

        run_once(&watch_root, &ledger).await;

        assert_eq!(concrete.removed.lock().unwrap().as_slice(), &[missing]);
    }

    #[tokio::test]
    async fn keeps_rows_for_files_still_present_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let watch_root = LocalPath::new(dir.path().to_path_buf()).unwrap();
        let present_path = dir.path().join("present.bin");
        std::fs::write(&present_path, b"x").unwrap();
        let present = LocalPath::new(present_path).unwrap();

        let concrete = Arc::new(FakeLedger {
            rows: StdMutex::new(vec![present.clone()]),
            removed: StdMutex::new(vec![]),
        });
        let ledger: Arc<dyn Ledger> = concrete.clone();

        run_once(&watch_root, &ledger).await;

        assert!(concrete.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn removes_rows_outside_the_watched_root() {
        let dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let watch_root = LocalPath::new(dir.path().to_path_buf()).unwrap();
        let outside_path = other_dir.path().join("outside.bin");
        std::fs::write(&outside_path, b"x").unwrap();
        let outside = LocalPath::new(outside_path).unwrap();

        let concrete = Arc::new(FakeLedger {
            rows: StdMutex::new(vec![outside.clone()]),
            removed: StdMutex::new(vec![]),
        });
        let ledger: Arc<dyn Ledger> = concrete.clone();

        run_once(&watch_root, &ledger).await;

        assert_eq!(concrete.removed.lock().unwrap().as_slice(), &[outside]);
    }
}
