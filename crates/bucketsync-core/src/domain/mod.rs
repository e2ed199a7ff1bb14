//! Domain entities, newtypes, and errors.

pub mod errors;
pub mod newtypes;

pub use errors::DomainError;
pub use newtypes::{BucketName, LocalPath, RemoteKey};
