// ABOUTME: Next-version computation from an application's release history.
// ABOUTME: Read-then-increment; the write precondition guards against races.

use super::history::History;
use super::record::release_key;
use super::{LedgerError, ReleaseRecord, Stored};
use crate::store::{ObjectLedgerStore, WriteCondition};
use crate::types::{AppName, ReleaseVersion};

/// Next version plus what the release key looked like when it was computed.
#[derive(Debug, Clone)]
pub struct NextVersion {
    pub version: ReleaseVersion,
    pub previous: Option<Stored<ReleaseRecord>>,
    /// Write condition that fails if another release lands first.
    pub condition: WriteCondition,
}

/// Computes monotonic release versions.
pub struct VersionResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ObjectLedgerStore + ?Sized> VersionResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// `latest.version + 1`, or 1 when the application has no releases.
    pub async fn next_version(&self, app: &AppName) -> Result<ReleaseVersion, LedgerError> {
        Ok(self.resolve(app).await?.version)
    }

    pub async fn resolve(&self, app: &AppName) -> Result<NextVersion, LedgerError> {
        let key = release_key(app);
        let head = History::new(self.store, &key).head::<ReleaseRecord>().await?;

        let condition = head.write_condition();

        let version = match &head.record {
            Some(latest) => {
                tracing::debug!(%app, latest = %latest.version(), "resolved latest release");
                latest.version().next()
            }
            None => ReleaseVersion::first(),
        };

        Ok(NextVersion {
            version,
            previous: head.record,
            condition,
        })
    }
}
