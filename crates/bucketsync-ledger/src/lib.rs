//! bucketsync-ledger — SQLite adapter for the `bucketsync_core::ports::Ledger` port
//!
//! Durable, serialized record of per-file delivery state. The backing store
//! is an embedded SQLite file in the working directory; schema migrations
//! run once at pool construction via `sqlx::raw_sql`.

mod null_ledger;
mod pool;
mod sqlite_ledger;

pub use null_ledger::NullLedger;
pub use pool::LedgerPool;
pub use sqlite_ledger::SqliteLedger;
