//! Synchronize service
//!
//! Periodically re-queues ledger-tracked failures while the reachability
//! probe reports the remote is up. A thin callback registered with
//! [`crate::periodic::PeriodicService`].

use std::sync::Arc;

use tracing::debug;

use bucketsync_core::domain::newtypes::LocalPath;
use bucketsync_core::ports::Ledger;

use crate::bucket::BucketEngine;
use crate::reachability::ReachabilityProbe;

/// One synchronize-service tick:
///
/// 1. Per bucket, `sweep(ledger)` — re-enqueue anything the ledger doesn't
///    yet record as delivered.
/// 2. `ledger.pop_failed(sweep_count)` — pull a bounded batch of previously
///    failed paths and route each to its bucket by stripping the watched
///    root prefix and matching the first remaining segment against a bucket
///    name; unmatched paths are dropped silently (the bucket that owned them
///    no longer exists).
///
/// A no-op while the probe reports the remote unreachable.
pub async fn run_once(
    watch_root: &LocalPath,
    buckets: &[Arc<BucketEngine>],
    ledger: &Arc<dyn Ledger>,
    probe: &Arc<ReachabilityProbe>,
    sweep_count: u32,
) {
    if !probe.is_up().await {
        debug!("synchronize tick skipped: remote unreachable");
        return;
    }

    for bucket in buckets {
        bucket.sweep_with_ledger(ledger.as_ref()).await;
    }

    if sweep_count == 0 {
        return;
    }

    for path in ledger.pop_failed(sweep_count).await {
        route_to_bucket(watch_root, buckets, path).await;
    }
}

async fn route_to_bucket(watch_root: &LocalPath, buckets: &[Arc<BucketEngine>], path: LocalPath) {
    let Ok(relative) = path.relative_to(watch_root) else {
        debug!(path = %path, "synchronize: path is not under the watched root, dropping");
        return;
    };
    let Some(bucket_segment) = relative.components().next() else {
        return;
    };
    let bucket_segment = bucket_segment.as_os_str().to_string_lossy();

    for bucket in buckets {
        if bucket.name().as_str() == bucket_segment {
            bucket.enqueue(path).await;
            return;
        }
    }
    debug!(path = %path, bucket = %bucket_segment, "synchronize: no bucket matches, dropping");
}

/// Builds the `PeriodicService` callback for the synchronize service.
/// Returns `None` if the service is disabled (`sweep_count == 0 ∨
/// sweep_interval == 0`), in which case the periodic service should simply
/// never be started.
pub fn enabled(sweep_interval_secs: u64, sweep_count: u32) -> bool {
    sweep_interval_secs != 0 && sweep_count != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{BucketConfig, BucketEngine};

    struct FakeLedger {
        failed: std::sync::Mutex<Vec<LocalPath>>,
    }

    #[async_trait::async_trait]
    impl Ledger for FakeLedger {
        async fn mark_failed(&self, _path: &LocalPath) {}
        async fn mark_succeeded(&self, _path: &LocalPath) {}
        async fn exists(&self, _path: &LocalPath) -> bool {
            false
        }
        async fn pop_failed(&self, limit: u32) -> Vec<LocalPath> {
            let mut failed = self.failed.lock().unwrap();
            let take = (limit as usize).min(failed.len());
            failed.drain(0..take).collect()
        }
        async fn pop_all(&self) -> Vec<LocalPath> {
            vec![]
        }
        async fn remove(&self, _path: &LocalPath) {}
    }

    struct FakeRemote;
    #[async_trait::async_trait]
    impl bucketsync_core::ports::RemoteObjectStore for FakeRemote {
        async fn put_object(
            &self,
            _bucket: &bucketsync_core::domain::newtypes::BucketName,
            _key: &bucketsync_core::domain::newtypes::RemoteKey,
            _bytes: Vec<u8>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn head_object(
            &self,
            _bucket: &bucketsync_core::domain::newtypes::BucketName,
            _key: &bucketsync_core::domain::newtypes::RemoteKey,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn bucket_region(
            &self,
            _bucket_name: &bucketsync_core::domain::newtypes::BucketName,
        ) -> anyhow::Result<String> {
            Ok("us-east-1".to_string())
        }
        async fn list_buckets(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[test]
    fn disabled_when_either_tunable_is_zero() {
        assert!(!enabled(0, 5));
        assert!(!enabled(30, 0));
        assert!(enabled(30, 5));
    }

    #[tokio::test]
    async fn skips_entirely_when_probe_reports_down() {
        let root_dir = tempfile::tempdir().unwrap();
        let bucket_dir = root_dir.path().join("b1");
        std::fs::create_dir(&bucket_dir).unwrap();
        let failing_path = bucket_dir.join("a.bin");
        std::fs::write(&failing_path, b"x").unwrap();

        let watch_root = LocalPath::new(root_dir.path().to_path_buf()).unwrap();
        let uploaded = Arc::new(std::sync::Mutex::new(Vec::new()));
        let uploaded_cb = uploaded.clone();
        let probe = Arc::new(ReachabilityProbe::with_target(
            std::time::Duration::from_millis(20),
            "127.0.0.1:1".to_string(),
        ));
        probe.is_up().await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let bucket = BucketEngine::construct(
            bucket_dir,
            Arc::new(FakeRemote),
            BucketConfig::default(),
            probe.clone(),
            Some(Arc::new(move |path: &LocalPath| {
                uploaded_cb.lock().unwrap().push(path.clone());
            })),
            None,
        )
        .await
        .unwrap();
        let ledger: Arc<dyn Ledger> = Arc::new(FakeLedger {
            failed: std::sync::Mutex::new(vec![LocalPath::new(failing_path).unwrap()]),
        });

        run_once(&watch_root, &[bucket], &ledger, &probe, 5).await;

        assert!(uploaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn routes_a_failed_path_to_its_owning_bucket() {
        let root_dir = tempfile::tempdir().unwrap();
        let bucket_dir = root_dir.path().join("b1");
        std::fs::create_dir(&bucket_dir).unwrap();
        let file_path = bucket_dir.join("a.bin");
        std::fs::write(&file_path, b"x").unwrap();

        let watch_root = LocalPath::new(root_dir.path().to_path_buf()).unwrap();
        let probe = Arc::new(ReachabilityProbe::new(std::time::Duration::ZERO));
        let bucket = BucketEngine::construct(
            bucket_dir,
            Arc::new(FakeRemote),
            BucketConfig::default(),
            probe.clone(),
            None,
            None,
        )
        .await
        .unwrap();
        let ledger: Arc<dyn Ledger> = Arc::new(FakeLedger {
            failed: std::sync::Mutex::new(vec![LocalPath::new(file_path).unwrap()]),
        });

        run_once(&watch_root, &[bucket.clone()], &ledger, &probe, 5).await;
        bucket.finish_pending().await;
    }
}
