//! Error taxonomy local to the engine crate.

use thiserror::Error;

use bucketsync_core::domain::errors::DomainError;

/// Errors raised while constructing a [`crate::bucket::BucketEngine`].
#[derive(Debug, Error)]
pub enum BucketError {
    /// The configured bucket path does not name a directory.
    #[error("bucket root is not a directory: {0}")]
    NotADirectory(String),

    /// The bucket root failed newtype validation (not absolute, `..`, or no
    /// usable final path segment).
    #[error(transparent)]
    InvalidRoot(#[from] DomainError),
}
