//! Reachability probe
//!
//! Exposes a cached boolean gating upload dispatch. Reading `is_up` starts
//! the periodic probe on first read if `period > 0`; with `period == 0` the
//! probe never runs and `is_up` is unconditionally `true`.
//!
//! The probe itself is a bounded-time TCP connect rather than an ICMP echo —
//! raw ICMP requires privileges this daemon should not need (see DESIGN.md).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::info;

/// Default probe target: a stable, well-known public endpoint and port.
const DEFAULT_PROBE_HOST: &str = "1.1.1.1:443";

/// Bound on a single probe attempt.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Periodically probes a fixed external host and exposes a cached boolean.
///
/// With `period == Duration::ZERO`, the probe is disabled and `is_up`
/// unconditionally returns `true` without ever starting a background task.
pub struct ReachabilityProbe {
    period: Duration,
    target: String,
    cached: Arc<AtomicBool>,
    worker: OnceCell<Mutex<Option<JoinHandle<()>>>>,
}

impl ReachabilityProbe {
    /// Builds a probe against the default target with the given period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self::with_target(period, DEFAULT_PROBE_HOST.to_string())
    }

    /// Builds a probe against an explicit `host:port` target (used by tests
    /// to point at a local listener or a closed port).
    #[must_use]
    pub fn with_target(period: Duration, target: String) -> Self {
        Self {
            period,
            target,
            cached: Arc::new(AtomicBool::new(true)),
            worker: OnceCell::new(),
        }
    }

    /// Returns the cached result of the last probe, starting the periodic
    /// probe on first call if `period > 0`.
    pub async fn is_up(&self) -> bool {
        if self.period.is_zero() {
            return true;
        }
        self.worker
            .get_or_init(|| async { Mutex::new(Some(self.spawn())) })
            .await;
        self.cached.load(Ordering::Acquire)
    }

    fn spawn(&self) -> JoinHandle<()> {
        let cached = self.cached.clone();
        let period = self.period;
        let target = self.target.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let reachable = probe_once(&target).await;
                let previous = cached.swap(reachable, Ordering::AcqRel);
                if previous != reachable {
                    info!(up = reachable, target = %target, "reachability probe edge change");
                }
            }
        })
    }
}

async fn probe_once(target: &str) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(target)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_period_is_always_up() {
        let probe = ReachabilityProbe::new(Duration::ZERO);
        assert!(probe.is_up().await);
    }

    #[tokio::test]
    async fn unreachable_target_flips_to_down() {
        // port 1 on loopback: nothing listens there, connect fails fast.
        let probe = ReachabilityProbe::with_target(Duration::from_millis(50), "127.0.0.1:1".to_string());
        // first read starts the worker; give it time for at least one tick.
        probe.is_up().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!probe.is_up().await);
    }

    #[tokio::test]
    async fn reachable_target_stays_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let probe = ReachabilityProbe::with_target(Duration::from_millis(50), addr.to_string());
        probe.is_up().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(probe.is_up().await);
    }
}
