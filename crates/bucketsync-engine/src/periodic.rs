//! Periodic service
//!
//! A generic cooperative timer: invokes a callback every `period` until
//! stopped. Built around a `tokio::select!`/`tokio::time::interval` loop,
//! generalized into a reusable primitive with a
//! `tokio_util::sync::CancellationToken` driving `stop()`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default period.
pub const DEFAULT_PERIOD_SECS: u64 = 10;

type Callback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A cooperative timer that invokes `run()` every `period` until stopped.
///
/// `start()` is idempotent (it stops any running worker first); `stop()`
/// cancels the worker and awaits its current `run()` invocation before
/// returning, so no invocation is ever interrupted mid-flight. Successive
/// ticks are serialized — the loop awaits the callback before scheduling the
/// next tick, so `run()` is never re-entered concurrently with itself.
pub struct PeriodicService {
    period: Mutex<Duration>,
    callback: Callback,
    worker: Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
    disposed: AtomicBool,
}

impl PeriodicService {
    /// Builds a service with the given initial period and callback.
    ///
    /// Setting `period` to `Duration::ZERO` is equivalent to never starting
    /// (or immediately stopping) the worker.
    pub fn new<F, Fut>(period: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            period: Mutex::new(period),
            callback: Arc::new(move || Box::pin(callback())),
            worker: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Updates the period. Setting it to zero stops the worker.
    pub async fn set_period(&self, period: Duration) {
        if self.disposed.load(Ordering::Acquire) {
            warn!("set_period called on a disposed PeriodicService; ignoring");
            return;
        }
        *self.period.lock().await = period;
        if period.is_zero() {
            self.stop().await;
        }
    }

    /// Idempotently launches the worker; a prior worker is stopped first.
    pub async fn start(&self) {
        if self.disposed.load(Ordering::Acquire) {
            warn!("start called on a disposed PeriodicService; ignoring");
            return;
        }
        self.stop().await;

        let period = *self.period.lock().await;
        if period.is_zero() {
            return;
        }

        let token = CancellationToken::new();
        let child_token = token.clone();
        let callback = self.callback.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = child_token.cancelled() => break,
                    _ = interval.tick() => {
                        callback().await;
                    }
                }
            }
        });

        *self.worker.lock().await = Some((handle, token));
    }

    /// Requests cancellation and blocks until the current `run()` completes.
    /// Safe to call when not started.
    pub async fn stop(&self) {
        if self.disposed.load(Ordering::Acquire) {
            warn!("stop called on a disposed PeriodicService; ignoring");
            return;
        }
        if let Some((handle, token)) = self.worker.lock().await.take() {
            token.cancel();
            let _ = handle.await;
        }
    }

    /// Tears the service down permanently. Implies `stop`; any subsequent
    /// `start`/`stop`/`set_period` logs a warning and no-ops rather than
    /// panicking (Open Question resolution, see DESIGN.md).
    pub async fn dispose(&self) {
        self.stop().await;
        self.disposed.store(true, Ordering::Release);
    }

    /// Returns `true` if a worker is currently running.
    pub async fn is_started(&self) -> bool {
        self.worker.lock().await.is_some()
    }
}
