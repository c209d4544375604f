// ABOUTME: Newest-first scans over an object's version history.
// ABOUTME: Undecodable or vanished entries are skipped rather than aborting a scan.

use super::{LedgerError, LedgerRecord, Stored};
use crate::store::{ObjectLedgerStore, ObjectMeta, WriteCondition};

/// Current head of a ledger key.
#[derive(Debug, Clone)]
pub struct Head<R> {
    /// Newest decodable record, which may sit below an invalid head.
    pub record: Option<Stored<R>>,
    /// Etag of the head object itself.
    pub etag: Option<String>,
    pub exists: bool,
}

impl<R> Head<R> {
    /// Condition under which a write lands only if the head has not moved.
    pub fn write_condition(&self) -> WriteCondition {
        match (self.exists, &self.etag) {
            (false, _) => WriteCondition::IfAbsent,
            (true, Some(etag)) => WriteCondition::IfMatch(etag.clone()),
            (true, None) => WriteCondition::Unconditional,
        }
    }
}

/// Version history of one ledger key.
pub struct History<'a, S: ?Sized> {
    store: &'a S,
    key: &'a str,
}

impl<'a, S: ObjectLedgerStore + ?Sized> History<'a, S> {
    pub fn new(store: &'a S, key: &'a str) -> Self {
        Self { store, key }
    }

    /// Fetch the latest record, `None` when the key has never been written.
    pub async fn latest<R: LedgerRecord>(&self) -> Result<Option<Stored<R>>, LedgerError> {
        Ok(self.head().await?.record)
    }

    /// Latest valid record together with the etag of the current head object.
    pub async fn head<R: LedgerRecord>(&self) -> Result<Head<R>, LedgerError> {
        let object = match self.store.get(self.key, None).await {
            Ok(object) => object,
            Err(err) if err.is_not_found() => {
                return Ok(Head {
                    record: None,
                    etag: None,
                    exists: false,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let record = match Stored::from_object(&object) {
            Ok(stored) => Some(stored),
            Err(LedgerError::InvalidRecord(reason)) => {
                // A corrupt head should not hide the valid history below it.
                self.warn_invalid(&object.meta, &reason);
                self.find(|_: &Stored<R>| true).await?
            }
            Err(err) => return Err(err),
        };

        Ok(Head {
            record,
            etag: object.meta.etag,
            exists: true,
        })
    }

    /// First record, newest first, matching `predicate`.
    pub async fn find<R, P>(&self, mut predicate: P) -> Result<Option<Stored<R>>, LedgerError>
    where
        R: LedgerRecord,
        P: FnMut(&Stored<R>) -> bool + Send,
    {
        for meta in self.store.list_versions(self.key).await? {
            if let Some(stored) = self.load(&meta).await?
                && predicate(&stored)
            {
                return Ok(Some(stored));
            }
        }
        Ok(None)
    }

    /// Records newest first, stopping after `limit` valid entries or at the
    /// first entry for which `stop` returns true (exclusive).
    pub async fn collect<R, P>(
        &self,
        limit: Option<usize>,
        mut stop: P,
    ) -> Result<Vec<Stored<R>>, LedgerError>
    where
        R: LedgerRecord,
        P: FnMut(&Stored<R>) -> bool + Send,
    {
        let mut records = Vec::new();
        for meta in self.store.list_versions(self.key).await? {
            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
            let Some(stored) = self.load(&meta).await? else {
                continue;
            };
            if stop(&stored) {
                break;
            }
            records.push(stored);
        }
        Ok(records)
    }

    async fn load<R: LedgerRecord>(
        &self,
        meta: &ObjectMeta,
    ) -> Result<Option<Stored<R>>, LedgerError> {
        let object = match self.store.get(self.key, Some(&meta.version_id)).await {
            Ok(object) => object,
            // The listing is not a snapshot; a version may disappear underneath us.
            Err(err) if err.is_not_found() => {
                tracing::warn!(key = self.key, version_id = %meta.version_id, "version vanished during scan");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match Stored::from_object(&object) {
            Ok(stored) => Ok(Some(stored)),
            Err(LedgerError::InvalidRecord(reason)) => {
                self.warn_invalid(&object.meta, &reason);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn warn_invalid(&self, meta: &ObjectMeta, reason: &str) {
        tracing::warn!(
            bucket = self.store.bucket(),
            key = self.key,
            version_id = %meta.version_id,
            "skipping invalid ledger entry: {}",
            reason
        );
    }
}
