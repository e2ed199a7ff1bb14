//! Coordinator
//!
//! Owns every long-lived collaborator — buckets, ledger, probe, watch trees,
//! and the two periodic services — and drives the two run modes. No
//! component here holds a strong back-reference to the coordinator; buckets
//! report through plain `Arc<dyn Fn>` callbacks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bucketsync_core::config::Config;
use bucketsync_core::domain::newtypes::LocalPath;
use bucketsync_core::ports::{Ledger, RemoteObjectStore};
use bucketsync_engine::{maintenance, synchronize, BucketConfig, BucketEngine, PeriodicService, ReachabilityProbe};
use bucketsync_watch::{ChangeEvent, WatchTree};

type FileCallback = Arc<dyn Fn(&LocalPath) + Send + Sync>;

/// Owns the full running system for one invocation of the daemon.
pub struct Coordinator {
    config: Config,
    ledger: Arc<dyn Ledger>,
    probe: Arc<ReachabilityProbe>,
    watch_root: LocalPath,
    buckets: Vec<Arc<BucketEngine>>,
}

impl Coordinator {
    /// Discovers one bucket per immediate subdirectory of `config.root` and
    /// wires each bucket's callbacks to the ledger.
    ///
    /// # Errors
    /// Returns an error if the root cannot be read or a subdirectory fails
    /// bucket construction.
    pub async fn bootstrap(
        config: Config,
        remote: Arc<dyn RemoteObjectStore>,
        ledger: Arc<dyn Ledger>,
    ) -> anyhow::Result<Self> {
        let watch_root = LocalPath::new(config.root.clone())?;
        let probe = Arc::new(ReachabilityProbe::new(Duration::from_secs(
            config.ping_interval_secs,
        )));

        let mut subdirectories = Vec::new();
        for entry in std::fs::read_dir(&config.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                subdirectories.push(entry.path());
            }
        }

        let mut buckets = Vec::with_capacity(subdirectories.len());
        for path in subdirectories {
            buckets.push(
                Self::construct_bucket(path, remote.clone(), ledger.clone(), probe.clone(), &config).await?,
            );
        }

        info!(buckets = buckets.len(), root = %config.root.display(), "coordinator bootstrapped");

        Ok(Self {
            config,
            ledger,
            probe,
            watch_root,
            buckets,
        })
    }

    async fn construct_bucket(
        path: PathBuf,
        remote: Arc<dyn RemoteObjectStore>,
        ledger: Arc<dyn Ledger>,
        probe: Arc<ReachabilityProbe>,
        config: &Config,
    ) -> anyhow::Result<Arc<BucketEngine>> {
        let bucket_config = BucketConfig {
            max_active_per_bucket: config.max_active_per_bucket as u32,
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
            verify_timeout: Duration::from_millis(config.verify_timeout_ms),
        };

        let succeeded_ledger = ledger.clone();
        let on_file_uploaded: FileCallback = Arc::new(move |path: &LocalPath| {
            let ledger = succeeded_ledger.clone();
            let path = path.clone();
            tokio::spawn(async move { ledger.mark_succeeded(&path).await });
        });

        let failed_ledger = ledger;
        let on_file_failed: FileCallback = Arc::new(move |path: &LocalPath| {
            let ledger = failed_ledger.clone();
            let path = path.clone();
            tokio::spawn(async move { ledger.mark_failed(&path).await });
        });

        BucketEngine::construct(
            path,
            remote,
            bucket_config,
            probe,
            Some(on_file_uploaded),
            Some(on_file_failed),
        )
        .await
        .map_err(Into::into)
    }

    /// Sweep-once mode: reconcile every bucket against disk, ignoring
    /// the ledger, then drain to completion. Does not start any watcher or
    /// periodic service.
    pub async fn sweep_once(&self) {
        for bucket in &self.buckets {
            bucket.sweep().await;
        }
        for bucket in &self.buckets {
            bucket.finish_pending().await;
        }
    }

    /// Daemonic mode: ledger-aware startup sweep, watchers, the two
    /// periodic services (if enabled), then block until a shutdown signal
    /// is received and drain every bucket.
    pub async fn run_daemon(self) -> anyhow::Result<()> {
        for bucket in &self.buckets {
            bucket.sweep_with_ledger(self.ledger.as_ref()).await;
        }

        let mut watch_trees = Vec::with_capacity(self.buckets.len());
        let mut watch_tasks: Vec<JoinHandle<()>> = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            let (tree, mut events) = WatchTree::start(bucket.root().as_path().to_path_buf()).await?;
            let bucket = bucket.clone();
            watch_tasks.push(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    route_change_event(&bucket, event).await;
                }
            }));
            watch_trees.push(tree);
        }

        let maintenance_service = self.start_maintenance_service();
        maintenance_service.start().await;
        let synchronize_service = self.start_synchronize_service();
        synchronize_service.start().await;

        wait_for_shutdown_signal().await;
        info!("shutdown signal received, draining buckets");

        synchronize_service.dispose().await;
        maintenance_service.dispose().await;
        for task in watch_tasks {
            task.abort();
        }
        for tree in watch_trees {
            tree.dispose().await;
        }
        for bucket in &self.buckets {
            bucket.shutdown().await;
        }

        info!("shutdown complete");
        Ok(())
    }

    fn start_maintenance_service(&self) -> PeriodicService {
        let watch_root = self.watch_root.clone();
        let ledger = self.ledger.clone();
        let service = PeriodicService::new(
            Duration::from_secs(self.config.clean_interval_secs),
            move || {
                let watch_root = watch_root.clone();
                let ledger = ledger.clone();
                async move { maintenance::run_once(&watch_root, &ledger).await }
            },
        );
        service
    }

    fn start_synchronize_service(&self) -> PeriodicService {
        let period = if synchronize::enabled(self.config.sweep_interval_secs, self.config.sweep_count) {
            Duration::from_secs(self.config.sweep_interval_secs)
        } else {
            Duration::ZERO
        };
        let watch_root = self.watch_root.clone();
        let buckets = self.buckets.clone();
        let ledger = self.ledger.clone();
        let probe = self.probe.clone();
        let sweep_count = self.config.sweep_count;
        PeriodicService::new(period, move || {
            let watch_root = watch_root.clone();
            let buckets = buckets.clone();
            let ledger = ledger.clone();
            let probe = probe.clone();
            async move { synchronize::run_once(&watch_root, &buckets, &ledger, &probe, sweep_count).await }
        })
    }
}

async fn route_change_event(bucket: &Arc<BucketEngine>, event: ChangeEvent) {
    let path = match event {
        ChangeEvent::Deleted(_) => return,
        ChangeEvent::Created(path) | ChangeEvent::Modified(path) => path,
        ChangeEvent::Renamed { new, .. } => new,
    };
    if !path.is_file() {
        return;
    }
    match LocalPath::new(path) {
        Ok(local) => bucket.enqueue(local).await,
        Err(err) => warn!(error = %err, "watch event carried an unusable path"),
    }
}

/// Blocks until Ctrl-C or SIGTERM is received. A second Ctrl-C received
/// after that point cannot be delivered gracefully and force-terminates the
/// process with the conventional SIGINT exit code.
async fn wait_for_shutdown_signal() {
    let quit = CancellationToken::new();

    let first_interrupt = quit.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        first_interrupt.cancel();
    });

    #[cfg(unix)]
    {
        let terminate = quit.clone();
        tokio::spawn(async move {
            if let Ok(mut stream) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            {
                stream.recv().await;
                terminate.cancel();
            }
        });
    }

    quit.cancelled().await;

    tokio::spawn(async {
        let _ = tokio::signal::ctrl_c().await;
        std::process::exit(130);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRemote;
    #[async_trait::async_trait]
    impl RemoteObjectStore for FakeRemote {
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

    struct FakeLedger {
        succeeded: std::sync::Mutex<Vec<LocalPath>>,
    }
    #[async_trait::async_trait]
    impl Ledger for FakeLedger {
        async fn mark_failed(&self, _path: &LocalPath) {}
        async fn mark_succeeded(&self, path: &LocalPath) {
            self.succeeded.lock().unwrap().push(path.clone());
        }
        async fn exists(&self, _path: &LocalPath) -> bool {
            false
        }
        async fn pop_failed(&self, _limit: u32) -> Vec<LocalPath> {
            vec![]
        }
        async fn pop_all(&self) -> Vec<LocalPath> {
            vec![]
        }
        async fn remove(&self, _path: &LocalPath) {}
    }

    #[tokio::test]
    async fn bootstrap_discovers_one_bucket_per_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b1")).unwrap();
        std::fs::create_dir(dir.path().join("b2")).unwrap();
        std::fs::write(dir.path().join("not-a-bucket.txt"), b"x").unwrap();

        let config = bucketsync_core::config::ConfigBuilder::new(dir.path().to_path_buf()).build();
        let ledger: Arc<dyn Ledger> = Arc::new(FakeLedger {
            succeeded: std::sync::Mutex::new(vec![]),
        });
        let coordinator = Coordinator::bootstrap(config, Arc::new(FakeRemote), ledger)
            .await
            .unwrap();

        assert_eq!(coordinator.buckets.len(), 2);
    }

    #[tokio::test]
    async fn sweep_once_uploads_every_file_and_marks_the_given_ledger() {
        // Coordinator itself always wires callbacks to whatever ledger it is
        // given; it's the daemon entry point's job to hand sweep-once a
        // no-op ledger so that mode truly ignores delivery state.
        let dir = tempfile::tempdir().unwrap();
        let bucket_dir = dir.path().join("b1");
        std::fs::create_dir(&bucket_dir).unwrap();
        std::fs::write(bucket_dir.join("a.bin"), b"hello").unwrap();

        let config = bucketsync_core::config::ConfigBuilder::new(dir.path().to_path_buf()).build();
        let ledger = Arc::new(FakeLedger {
            succeeded: std::sync::Mutex::new(vec![]),
        });
        let dyn_ledger: Arc<dyn Ledger> = ledger.clone();
        let coordinator = Coordinator::bootstrap(config, Arc::new(FakeRemote), dyn_ledger)
            .await
            .unwrap();

        coordinator.sweep_once().await;

        // upload callbacks spawn a detached task; give it a tick to land.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ledger.succeeded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sweep_once_with_a_null_ledger_leaves_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let bucket_dir = dir.path().join("b1");
        std::fs::create_dir(&bucket_dir).unwrap();
        std::fs::write(bucket_dir.join("a.bin"), b"hello").unwrap();

        let config = bucketsync_core::config::ConfigBuilder::new(dir.path().to_path_buf()).build();
        let ledger: Arc<dyn Ledger> = Arc::new(bucketsync_ledger::NullLedger);
        let coordinator = Coordinator::bootstrap(config, Arc::new(FakeRemote), ledger.clone())
            .await
            .unwrap();

        coordinator.sweep_once().await;

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ledger.exists(&LocalPath::new(bucket_dir.join("a.bin")).unwrap()).await);
    }
}
