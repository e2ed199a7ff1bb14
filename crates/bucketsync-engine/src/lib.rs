//! bucketsync-engine — reachability probing, periodic services, and the
//! per-bucket upload engine.
//!
//! The coordinator (`bucketsync-daemon`) owns one [`bucket::BucketEngine`]
//! per watched subdirectory, one [`reachability::ReachabilityProbe`], and
//! wires [`synchronize`] / [`maintenance`] in as callbacks on
//! [`periodic::PeriodicService`] instances it starts and stops itself.

pub mod bucket;
pub mod errors;
pub mod maintenance;
pub mod periodic;
pub mod reachability;
pub mod synchronize;

pub use bucket::{BucketConfig, BucketEngine};
pub use errors::BucketError;
pub use periodic::PeriodicService;
pub use reachability::ReachabilityProbe;
