//! Bucket engine
//!
//! Owns one local directory's upload lifecycle: a FIFO/set `pending` queue,
//! a bounded `active` map of in-flight uploads, and the upload state
//! machine that drives each one. Structured around the "own a port, drive
//! tasks, report through callbacks" shape, generalized into a multi-bucket-
//! ready, cancellation-aware upload queue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bucketsync_core::domain::newtypes::{BucketName, LocalPath, RemoteKey};
use bucketsync_core::ports::{Ledger, RemoteObjectStore};

use crate::errors::BucketError;
use crate::reachability::ReachabilityProbe;

/// Bound on the region lookup performed at construction.
const REGION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period given to the losing side of an upload/verify race before the
/// state machine gives up waiting on it and treats it as abandoned.
const LOSER_GRACE: Duration = Duration::from_secs(5);

/// Tunables for a [`BucketEngine`].
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    /// Cardinality cap on `active`. The bound check is `>=`, not `>` — a
    /// bucket at exactly the limit is already full (Open Question
    /// resolution, see DESIGN.md).
    pub max_active_per_bucket: u32,
    /// Bound on a single PUT attempt before it is treated as failed.
    pub upload_timeout: Duration,
    /// Bound on the post-upload HEAD check; zero disables verification.
    pub verify_timeout: Duration,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            max_active_per_bucket: 10,
            upload_timeout: Duration::from_secs(10),
            verify_timeout: Duration::ZERO,
        }
    }
}

struct ActiveUpload {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

#[derive(Default)]
struct BucketState {
    pending: VecDeque<LocalPath>,
    pending_set: HashSet<LocalPath>,
    active: HashMap<LocalPath, ActiveUpload>,
}

type FileCallback = Arc<dyn Fn(&LocalPath) + Send + Sync>;

/// Owns one target bucket's upload lifecycle.
pub struct BucketEngine {
    name: BucketName,
    root: LocalPath,
    remote: Arc<dyn RemoteObjectStore>,
    config: BucketConfig,
    probe: Arc<ReachabilityProbe>,
    state: Mutex<BucketState>,
    idle: Notify,
    connected: AtomicBool,
    disposed: AtomicBool,
    on_file_uploaded: Option<FileCallback>,
    on_file_failed: Option<FileCallback>,
}

impl BucketEngine {
    /// Validates `path`, derives the bucket name from its final segment, and
    /// attempts a bounded region lookup. A failed lookup does not fail
    /// construction — the bucket comes up `validated` but not `connected`,
    /// and never accepts uploads until something else flips it.
    ///
    /// # Errors
    /// Returns [`BucketError`] if `path` is not an absolute, existing
    /// directory, or its final segment is not a valid bucket name.
    pub async fn construct(
        path: PathBuf,
        remote: Arc<dyn RemoteObjectStore>,
        config: BucketConfig,
        probe: Arc<ReachabilityProbe>,
        on_file_uploaded: Option<FileCallback>,
        on_file_failed: Option<FileCallback>,
    ) -> Result<Arc<Self>, BucketError> {
        if !path.is_dir() {
            return Err(BucketError::NotADirectory(path.display().to_string()));
        }
        let root = LocalPath::new(path)?;
        let name = BucketName::from_path(root.as_path())?;

        let bucket = Arc::new(Self {
            name,
            root,
            remote,
            config,
            probe,
            state: Mutex::new(BucketState::default()),
            idle: Notify::new(),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            on_file_uploaded,
            on_file_failed,
        });
        bucket.try_connect().await;
        Ok(bucket)
    }

    async fn try_connect(&self) {
        match tokio::time::timeout(REGION_LOOKUP_TIMEOUT, self.remote.bucket_region(&self.name))
            .await
        {
            Ok(Ok(region)) => {
                self.connected.store(true, Ordering::Release);
                info!(bucket = %self.name, region, "bucket connected");
            }
            Ok(Err(err)) => {
                warn!(bucket = %self.name, error = %err, "bucket region lookup failed");
            }
            Err(_) => {
                warn!(bucket = %self.name, "bucket region lookup timed out");
            }
        }
    }

    /// `validated ∧ connected ∧ !disposed`.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn name(&self) -> &BucketName {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &LocalPath {
        &self.root
    }

    /// Queues `path` for upload if it is not already pending or active.
    /// No-ops unless the bucket is `ready` (validated, connected, and not
    /// disposed) — only a `ready` bucket accepts uploads.
    pub async fn enqueue(self: &Arc<Self>, path: LocalPath) {
        if !self.ready() {
            return;
        }
        {
            let mut state = self.state.lock().await;
            if state.pending_set.contains(&path) || state.active.contains_key(&path) {
                return;
            }
            state.pending_set.insert(path.clone());
            state.pending.push_back(path);
        }
        self.dispatch().await;
    }

    /// Walks the bucket root and enqueues every regular file unconditionally
    /// (sweep-once mode).
    pub async fn sweep(self: &Arc<Self>) {
        for path in self.walk() {
            self.enqueue(path).await;
        }
        // A path already sitting in `pending` from an earlier dispatch that
        // found the probe down is never re-enqueued (it's already a member
        // of `pending_set`), so each sweep also re-kicks dispatch directly —
        // this is what lets a file retained in `pending` while the network
        // was down get dispatched once the probe flips back up, within one
        // sweep interval, without waiting on an unrelated new file event.
        self.dispatch().await;
    }

    /// Walks the bucket root and enqueues every regular file the ledger does
    /// not already record as delivered (daemonic startup sweep).
    pub async fn sweep_with_ledger(self: &Arc<Self>, ledger: &dyn Ledger) {
        for path in self.walk() {
            if !ledger.exists(&path).await {
                self.enqueue(path).await;
            }
        }
        self.dispatch().await;
    }

    fn walk(&self) -> Vec<LocalPath> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.as_path().to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "sweep could not read directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let entry_path = entry.path();
                match entry.file_type() {
                    Ok(ft) if ft.is_dir() => stack.push(entry_path),
                    Ok(ft) if ft.is_file() => {
                        if let Ok(local) = LocalPath::new(entry_path) {
                            out.push(local);
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }

    /// Blocks until both `pending` and `active` are empty, driving dispatch
    /// as slots free up.
    pub async fn finish_pending(self: &Arc<Self>) {
        self.dispatch().await;
        loop {
            // `enable()` registers this future as a waiter before the drain
            // condition is checked, so a `notify_waiters()` landing between
            // the check and the `.await` below is still observed — without
            // it, that call (which stores no permit) would be lost and this
            // loop would block forever on an already-drained bucket.
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock().await;
                if state.pending.is_empty() && state.active.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Atomically replaces `pending` with an empty queue, then signals every
    /// `active` entry's cancellation handle and waits up to
    /// [`LOSER_GRACE`] per entry before moving on — cancellation is
    /// best-effort, so an upload that outlives its grace period is left
    /// to finish (or fail) on its own.
    pub async fn cancel_pending(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock().await;
            state.pending.clear();
            state.pending_set.clear();
            state
                .active
                .values_mut()
                .map(|upload| {
                    upload.token.cancel();
                    // JoinHandle isn't Clone; we only need a handle to wait
                    // on, so swap in a detached no-op and await the real one.
                    std::mem::replace(&mut upload.handle, tokio::spawn(async {}))
                })
                .collect()
        };
        for handle in handles {
            let _ = tokio::time::timeout(LOSER_GRACE, handle).await;
        }
    }

    /// Marks the bucket disposed (stops accepting new enqueues and dispatch
    /// of further pending work), then waits for any currently in-flight
    /// uploads to finish naturally.
    pub async fn shutdown(&self) {
        self.disposed.store(true, Ordering::Release);
        loop {
            // See `finish_pending`'s comment: registering before the check
            // avoids a missed `notify_waiters()` wakeup.
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock().await;
                if state.active.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// While the bucket is `ready`, the probe reports the remote reachable,
    /// and the active-set cap isn't hit, pops the pending head and spawns
    /// its upload. A pop that unexpectedly returns `None` under a non-empty
    /// queue (unreachable outside mutex poisoning in safe Rust) is retried
    /// once after a 1 ms backoff.
    ///
    /// Consults the probe before every dispatch: while it reports the
    /// remote down, nothing is popped off `pending`, so no file ever gets
    /// as far as an upload attempt until reachability is restored.
    async fn dispatch(self: &Arc<Self>) {
        loop {
            if !self.ready() {
                return;
            }
            if !self.probe.is_up().await {
                return;
            }

            let mut state = self.state.lock().await;
            if !self.ready() {
                return;
            }
            if state.active.len() >= self.config.max_active_per_bucket as usize {
                return;
            }
            if state.pending.is_empty() {
                return;
            }
            let path = match state.pending.pop_front() {
                Some(path) => path,
                None => {
                    drop(state);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let mut retry_state = self.state.lock().await;
                    match retry_state.pending.pop_front() {
                        Some(path) => {
                            retry_state.pending_set.remove(&path);
                            let token = CancellationToken::new();
                            let handle = self.clone().spawn_upload(path.clone(), token.clone());
                            retry_state.active.insert(path, ActiveUpload { handle, token });
                            continue;
                        }
                        None => return,
                    }
                }
            };
            state.pending_set.remove(&path);
            let token = CancellationToken::new();
            let handle = self.clone().spawn_upload(path.clone(), token.clone());
            state.active.insert(path, ActiveUpload { handle, token });
        }
    }

    fn spawn_upload(self: Arc<Self>, path: LocalPath, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let outcome = self.try_upload(&path, &token).await;
            {
                let mut state = self.state.lock().await;
                state.active.remove(&path);
            }
            self.idle.notify_waiters();
            match outcome {
                UploadOutcome::Succeeded => {
                    debug!(bucket = %self.name, path = %path, "upload succeeded");
                    if let Some(cb) = &self.on_file_uploaded {
                        cb(&path);
                    }
                }
                UploadOutcome::Failed => {
                    warn!(bucket = %self.name, path = %path, "upload failed");
                    if let Some(cb) = &self.on_file_failed {
                        cb(&path);
                    }
                }
            }
            self.dispatch().await;
        })
    }

    async fn try_upload(&self, path: &LocalPath, token: &CancellationToken) -> UploadOutcome {
        let key = match RemoteKey::derive(path, &self.root) {
            Ok(key) => key,
            Err(err) => {
                warn!(path = %path, error = %err, "cannot derive remote key, dropping upload");
                return UploadOutcome::Failed;
            }
        };

        let bytes = match tokio::fs::read(path.as_path()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path, error = %err, "local read failed before upload");
                return UploadOutcome::Failed;
            }
        };

        let remote = self.remote.clone();
        let bucket_name = self.name.clone();
        let put_key = key.clone();
        let upload_op = async move { remote.put_object(&bucket_name, &put_key, bytes).await };

        let put_succeeded = matches!(
            race(upload_op, self.config.upload_timeout, token.child_token()).await,
            RaceOutcome::Completed(Ok(())),
        );
        if !put_succeeded {
            return UploadOutcome::Failed;
        }

        if self.config.verify_timeout.is_zero() {
            return UploadOutcome::Succeeded;
        }

        let remote = self.remote.clone();
        let bucket_name = self.name.clone();
        let verify_key = key.clone();
        let verify_op = async move { remote.head_object(&bucket_name, &verify_key).await };

        match race(verify_op, self.config.verify_timeout, token.child_token()).await {
            RaceOutcome::Completed(Ok(true)) => UploadOutcome::Succeeded,
            RaceOutcome::Completed(Ok(false)) => {
                warn!(path = %path, key = %key, "post-upload verification did not find the object");
                UploadOutcome::Failed
            }
            _ => {
                warn!(path = %path, key = %key, "verification failed or timed out");
                UploadOutcome::Failed
            }
        }
    }
}

enum UploadOutcome {
    Succeeded,
    Failed,
}

enum RaceOutcome<T> {
    Completed(T),
    TimedOut,
}

/// Races `op` against a `timeout` sleep, both driven as separate tasks
/// sharing a clone of `token`. The winner cancels `token`
/// unconditionally; the loser is given up to [`LOSER_GRACE`] to acknowledge
/// cancellation before this function gives up waiting on it and returns,
/// leaving the loser task to finish on its own time (cancellation is
/// best-effort).
async fn race<F, T>(op: F, timeout: Duration, token: CancellationToken) -> RaceOutcome<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let op_token = token.clone();
    let mut op_handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            () = op_token.cancelled() => None,
            result = op => Some(result),
        }
    });

    let timer_token = token.clone();
    let mut timer_handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            () = timer_token.cancelled() => {},
            () = tokio::time::sleep(timeout) => {},
        }
    });

    tokio::select! {
        res = &mut op_handle => {
            token.cancel();
            let _ = tokio::time::timeout(LOSER_GRACE, &mut timer_handle).await;
            match res {
                Ok(Some(value)) => RaceOutcome::Completed(value),
                _ => RaceOutcome::TimedOut,
            }
        }
        _ = &mut timer_handle => {
            token.cancel();
            let _ = tokio::time::timeout(LOSER_GRACE, &mut op_handle).await;
            RaceOutcome::TimedOut
        }
    }
}
