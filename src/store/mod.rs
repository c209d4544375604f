// ABOUTME: Versioned object store abstraction backing the ledger.
// ABOUTME: Exposes get/put/list-versions with no locking or business logic.

mod error;
mod memory;
mod retry;
mod s3;

pub use error::{StoreError, StoreErrorKind};
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, Retrying};
pub use s3::{S3Store, classify_service_error};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::ObjectVersionId;

/// Metadata describing one stored version of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub version_id: ObjectVersionId,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_latest: bool,
}

/// Body and metadata of a fetched object version.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub meta: ObjectMeta,
}

/// Precondition attached to a write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Always append a new version.
    #[default]
    Unconditional,
    /// Only write if the key has no current version.
    IfAbsent,
    /// Only write if the current version still carries this etag.
    IfMatch(String),
}

/// Versioned object storage scoped to a single bucket.
///
/// Every successful `put` appends a new, independently addressable version;
/// nothing is ever overwritten in place. Consistency between concurrent
/// writers is the caller's concern.
#[async_trait]
pub trait ObjectLedgerStore: Send + Sync {
    /// Bucket (or namespace) this store addresses.
    fn bucket(&self) -> &str;

    /// Fetch the latest version of `key`, or a specific version when given.
    async fn get(
        &self,
        key: &str,
        version_id: Option<&ObjectVersionId>,
    ) -> Result<StoredObject, StoreError>;

    /// Write a new version of `key`.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError>;

    /// All versions of exactly `key`, newest first.
    async fn list_versions(&self, key: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Every key currently present in the bucket, sorted.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<S: ObjectLedgerStore + ?Sized> ObjectLedgerStore for Arc<S> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn get(
        &self,
        key: &str,
        version_id: Option<&ObjectVersionId>,
    ) -> Result<StoredObject, StoreError> {
        (**self).get(key, version_id).await
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError> {
        (**self).put(key, body, condition).await
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        (**self).list_versions(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_keys().await
    }
}

/// Order versions newest first: the latest marker wins, then last-modified
/// descending. The sort is stable so backend order breaks ties.
pub(crate) fn sort_newest_first(versions: &mut [ObjectMeta]) {
    versions.sort_by(|a, b| {
        b.is_latest
            .cmp(&a.is_latest)
            .then_with(|| b.last_modified.cmp(&a.last_modified))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta(id: &str, latest: bool, secs: i64) -> ObjectMeta {
        ObjectMeta {
            version_id: ObjectVersionId::new(id),
            etag: None,
            last_modified: Some(Utc.timestamp_opt(secs, 0).unwrap()),
            is_latest: latest,
        }
    }

    #[test]
    fn latest_marker_sorts_first() {
        let mut versions = vec![meta("a", false, 30), meta("b", true, 10), meta("c", false, 20)];
        sort_newest_first(&mut versions);
        let ids: Vec<_> = versions.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn equal_timestamps_keep_backend_order() {
        let mut versions = vec![meta("x", false, 10), meta("y", false, 10)];
        sort_newest_first(&mut versions);
        assert_eq!(versions[0].version_id.as_str(), "x");
    }
}
