//! `NullLedger`: a `Ledger` port adapter that discards every write and
//! answers every read as "unknown".
//!
//! Sweep-once mode ignores the ledger entirely per its mode contract — it
//! neither filters the startup sweep through it nor records delivery state
//! from it, so the daemon never opens the backing SQLite file for that run.
//! Wiring bucket callbacks to a `NullLedger` instead of skipping the wiring
//! keeps `Coordinator::bootstrap` mode-agnostic.

use bucketsync_core::domain::newtypes::LocalPath;
use bucketsync_core::ports::Ledger;

/// No-op `Ledger` adapter used in sweep-once mode.
pub struct NullLedger;

#[async_trait::async_trait]
impl Ledger for NullLedger {
    async fn mark_failed(&self, _path: &LocalPath) {}

    async fn mark_succeeded(&self, _path: &LocalPath) {}

    async fn exists(&self, _path: &LocalPath) -> bool {
        false
    }

    async fn pop_failed(&self, _limit: u32) -> Vec<LocalPath> {
        Vec::new()
    }

    async fn pop_all(&self) -> Vec<LocalPath> {
        Vec::new()
    }

    async fn remove(&self, _path: &LocalPath) {}
}
