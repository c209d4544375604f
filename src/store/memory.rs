// ABOUTME: In-process versioned object store.
// ABOUTME: Mirrors S3 versioning semantics for tests and local experiments.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

use super::{ObjectLedgerStore, ObjectMeta, StoreError, StoredObject, WriteCondition};
use crate::types::ObjectVersionId;

/// Versioned in-memory bucket.
///
/// Each `put` appends a version with a fresh version id and etag. Failures can
/// be queued with [`MemoryStore::fail_next`] to exercise retry paths.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Vec<(Bytes, ObjectMeta)>>,
    writes: u64,
    calls: u64,
    injected: VecDeque<StoreError>,
    lost_responses: u32,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Queue errors returned by the next operations, one per call.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.state.lock().injected.extend(errors);
    }

    /// Let the next `count` puts land, then report them as transient failures.
    pub fn lose_next_responses(&self, count: u32) {
        self.state.lock().lost_responses += count;
    }

    /// Total operations attempted against this store, including failed ones.
    pub fn calls(&self) -> u64 {
        self.state.lock().calls
    }

    /// Number of stored versions under `key`.
    pub fn version_count(&self, key: &str) -> usize {
        self.state.lock().objects.get(key).map_or(0, Vec::len)
    }

    fn enter(&self) -> Result<parking_lot::MutexGuard<'_, State>, StoreError> {
        let mut state = self.state.lock();
        state.calls += 1;
        match state.injected.pop_front() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl ObjectLedgerStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(
        &self,
        key: &str,
        version_id: Option<&ObjectVersionId>,
    ) -> Result<StoredObject, StoreError> {
        let state = self.enter()?;
        let versions = state
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let found = match version_id {
            None => versions.last(),
            Some(id) => versions.iter().find(|(_, meta)| &meta.version_id == id),
        };

        found
            .map(|(body, meta)| StoredObject {
                body: body.clone(),
                meta: meta.clone(),
            })
            .ok_or_else(|| match version_id {
                Some(id) => StoreError::NotFound(format!("{key}@{id}")),
                None => StoreError::NotFound(key.to_string()),
            })
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError> {
        let mut state = self.enter()?;
        let current_etag = state
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .and_then(|(_, meta)| meta.etag.clone());

        let allowed = match &condition {
            WriteCondition::Unconditional => true,
            WriteCondition::IfAbsent => current_etag.is_none(),
            WriteCondition::IfMatch(expected) => current_etag.as_deref() == Some(expected.as_str()),
        };
        if !allowed {
            return Err(StoreError::PreconditionFailed(key.to_string()));
        }

        state.writes += 1;
        let meta = ObjectMeta {
            version_id: ObjectVersionId::new(format!("mem-{:08}", state.writes)),
            etag: Some(format!("\"{:x}\"", state.writes)),
            last_modified: Some(Utc::now()),
            is_latest: true,
        };

        let versions = state.objects.entry(key.to_string()).or_default();
        if let Some((_, previous)) = versions.last_mut() {
            previous.is_latest = false;
        }
        versions.push((body, meta.clone()));

        if state.lost_responses > 0 {
            state.lost_responses -= 1;
            return Err(StoreError::Transient(format!(
                "response for {key} lost after write"
            )));
        }
        Ok(meta)
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let state = self.enter()?;
        Ok(state
            .objects
            .get(key)
            .map(|versions| versions.iter().rev().map(|(_, meta)| meta.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let state = self.enter()?;
        Ok(state.objects.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_appends_versions_newest_first() {
        let store = MemoryStore::new("test");
        let first = store
            .put("app", Bytes::from_static(b"1"), WriteCondition::Unconditional)
            .await
            .unwrap();
        let second = store
            .put("app", Bytes::from_static(b"2"), WriteCondition::Unconditional)
            .await
            .unwrap();

        let versions = store.list_versions("app").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_id, second.version_id);
        assert!(versions[0].is_latest);
        assert_eq!(versions[1].version_id, first.version_id);
        assert!(!versions[1].is_latest);
    }

    #[tokio::test]
    async fn get_specific_version() {
        let store = MemoryStore::new("test");
        let first = store
            .put("app", Bytes::from_static(b"old"), WriteCondition::Unconditional)
            .await
            .unwrap();
        store
            .put("app", Bytes::from_static(b"new"), WriteCondition::Unconditional)
            .await
            .unwrap();

        let latest = store.get("app", None).await.unwrap();
        assert_eq!(&latest.body[..], b"new");

        let old = store.get("app", Some(&first.version_id)).await.unwrap();
        assert_eq!(&old.body[..], b"old");
    }

    #[tokio::test]
    async fn missing_key_and_version_are_not_found() {
        let store = MemoryStore::new("test");
        assert!(store.get("nope", None).await.unwrap_err().is_not_found());

        store
            .put("app", Bytes::from_static(b"x"), WriteCondition::Unconditional)
            .await
            .unwrap();
        let missing = ObjectVersionId::new("mem-99999999");
        assert!(
            store
                .get("app", Some(&missing))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn conditional_writes_enforce_preconditions() {
        let store = MemoryStore::new("test");
        let first = store
            .put("app", Bytes::from_static(b"1"), WriteCondition::IfAbsent)
            .await
            .unwrap();

        let err = store
            .put("app", Bytes::from_static(b"2"), WriteCondition::IfAbsent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed(_)));

        let etag = first.etag.clone().unwrap();
        store
            .put("app", Bytes::from_static(b"2"), WriteCondition::IfMatch(etag.clone()))
            .await
            .unwrap();

        let stale = store
            .put("app", Bytes::from_static(b"3"), WriteCondition::IfMatch(etag))
            .await
            .unwrap_err();
        assert!(matches!(stale, StoreError::PreconditionFailed(_)));
        assert_eq!(store.version_count("app"), 2);
    }

    #[tokio::test]
    async fn lost_responses_still_store_the_write() {
        let store = MemoryStore::new("test");
        store.lose_next_responses(1);

        let err = store
            .put("app", Bytes::from_static(b"x"), WriteCondition::IfAbsent)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.version_count("app"), 1);

        store
            .put("app", Bytes::from_static(b"y"), WriteCondition::Unconditional)
            .await
            .unwrap();
        assert_eq!(store.version_count("app"), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new("test");
        store.fail_next([StoreError::Transient("reset".into())]);

        assert!(store.list_keys().await.unwrap_err().is_retryable());
        assert!(store.list_keys().await.unwrap().is_empty());
        assert_eq!(store.calls(), 2);
    }
}
