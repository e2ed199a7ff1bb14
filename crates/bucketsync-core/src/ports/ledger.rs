//! Ledger port (driven/secondary port)
//!
//! Durable record of per-file delivery state and failure attempt counter.
//! The concrete adapter (`bucketsync-ledger::SqliteLedger`) implements this
//! trait against an embedded relational store.

use crate::domain::newtypes::LocalPath;

/// Port trait for the delivery ledger.
///
/// All operations are serialized by the implementation (a single mutex in
/// the reference adapter); on an unrecoverable backing-store error the
/// ledger is expected to transition to a disposed, no-op state rather than
/// propagating further failures.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Upserts a `failed` row for `path`, incrementing `attempts` if the row
    /// already exists. No-op if the store is disposed.
    async fn mark_failed(&self, path: &LocalPath);

    /// Deletes any `failed` row for `path`, then upserts a `succeeded` row,
    /// in one transaction.
    async fn mark_succeeded(&self, path: &LocalPath);

    /// Returns `true` iff any row (either state) exists for `path`.
    async fn exists(&self, path: &LocalPath) -> bool;

    /// Returns up to `limit` paths in `failed` state whose `attempts` is
    /// below the configured `fail_limit`. Read-only: rows remain until the
    /// upload succeeds or the row is tombstoned.
    async fn pop_failed(&self, limit: u32) -> Vec<LocalPath>;

    /// Returns every path currently tracked, regardless of state.
    async fn pop_all(&self) -> Vec<LocalPath>;

    /// Deletes the row for `path` in either table.
    async fn remove(&self, path: &LocalPath);
}
