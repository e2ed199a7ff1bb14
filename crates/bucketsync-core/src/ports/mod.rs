//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`RemoteObjectStore`] — the remote object-store collaborator, specified
//!   here only at its interface.
//! - [`Ledger`] — the durable per-path delivery-state store.

pub mod ledger;
pub mod remote_object_store;

pub use ledger::Ledger;
pub use remote_object_store::RemoteObjectStore;
