//! Domain error types
//!
//! Validation failures for newtypes, plus the taxonomy used by the rest of
//! the workspace to classify remote/local failures.

use thiserror::Error;

/// Errors raised while constructing or manipulating domain newtypes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A local path that is not absolute, escapes its root, or is otherwise malformed.
    #[error("invalid local path: {0}")]
    InvalidLocalPath(String),

    /// A bucket name derived from a path segment containing a separator.
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// A remote key that is empty, has a leading slash, or contains `..`.
    #[error("invalid remote key: {0}")]
    InvalidRemoteKey(String),
}

/// Classification of a failure from the remote object store or local I/O,
/// used for logging. Both `Transient` and `Permanent` remote failures are
/// handled identically by the ledger — the distinction is informational.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network failure, 5xx response, or operation timeout.
    #[error("transient remote error: {0}")]
    Transient(String),

    /// 4xx response other than throttling.
    #[error("permanent remote error: {0}")]
    Permanent(String),

    /// Upload acknowledged but the post-upload HEAD did not find the object.
    #[error("verification mismatch for key {0}")]
    VerificationMismatch(String),
}

impl RemoteError {
    /// Best-effort classification of an opaque error message by substring
    /// sniffing, to tell transient failures apart from permanent ones for
    /// logging purposes only.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let transient_markers = [
            "network",
            "connection",
            "timeout",
            "timed out",
            "dns",
            "reset by peer",
            "broken pipe",
            "429",
            "too many requests",
            "rate limit",
            "500",
            "502",
            "503",
            "504",
            "server error",
        ];
        if transient_markers.iter().any(|m| lowered.contains(m)) {
            Self::Transient(message.to_string())
        } else {
            Self::Permanent(message.to_string())
        }
    }
}

/// Errors raised by a `Ledger` port implementation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store failed in a way the ledger cannot recover from;
    /// the ledger transitions to a disposed, no-op state after this.
    #[error("ledger backing store unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

/// Errors raised while constructing or operating a watch node.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The native watch handle could not be opened even after the 750 ms
    /// retry, and the directory was abandoned.
    #[error("could not watch {path}: {source}")]
    Abandoned {
        /// Path of the abandoned directory.
        path: String,
        /// Underlying notify error.
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_transient_markers() {
        assert!(matches!(
            RemoteError::classify("connection reset by peer"),
            RemoteError::Transient(_)
        ));
        assert!(matches!(
            RemoteError::classify("503 Service Unavailable"),
            RemoteError::Transient(_)
        ));
    }

    #[test]
    fn classify_permanent_default() {
        assert!(matches!(
            RemoteError::classify("403 Forbidden"),
            RemoteError::Permanent(_)
        ));
    }

    #[test]
    fn domain_error_display() {
        let err = DomainError::InvalidBucketName("a/b".to_string());
        assert_eq!(err.to_string(), "invalid bucket name: a/b");
    }
}
