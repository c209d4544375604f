// ABOUTME: Error types for object store operations.
// ABOUTME: Distinguishes retryable backend failures from fatal ones.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key or version id does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Credentials lack permission. Never retried.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network or backend hiccup; safe to retry.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// The call exceeded the configured timeout ceiling.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// A conditional write lost against another writer.
    #[error("write precondition failed for {0}")]
    PreconditionFailed(String),

    /// The bucket returned an object without a version id.
    #[error("bucket {0} does not have versioning enabled")]
    Unversioned(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    AccessDenied,
    Transient,
    Timeout,
    PreconditionFailed,
    Unversioned,
    Backend,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::NotFound(_) => StoreErrorKind::NotFound,
            StoreError::AccessDenied(_) => StoreErrorKind::AccessDenied,
            StoreError::Transient(_) => StoreErrorKind::Transient,
            StoreError::Timeout(_) => StoreErrorKind::Timeout,
            StoreError::PreconditionFailed(_) => StoreErrorKind::PreconditionFailed,
            StoreError::Unversioned(_) => StoreErrorKind::Unversioned,
            StoreError::Backend(_) => StoreErrorKind::Backend,
        }
    }

    /// Only transient failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_and_timeout_retry() {
        assert!(StoreError::Transient("reset".into()).is_retryable());
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!StoreError::NotFound("app".into()).is_retryable());
        assert!(!StoreError::AccessDenied("app".into()).is_retryable());
        assert!(!StoreError::PreconditionFailed("app".into()).is_retryable());
    }
}
