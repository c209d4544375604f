// ABOUTME: Release and deploy records plus their JSON wire format.
// ABOUTME: Records are immutable once written; version ids come from the store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LedgerError;
use crate::store::{ObjectMeta, StoredObject};
use crate::types::{
    AppName, CommitHash, EnvironmentName, ImageId, ObjectVersionId, ReleaseVersion,
};

const CHANGELOG_UNAVAILABLE: &str = "<changelog unavailable>";

/// Object key holding an application's release history.
pub fn release_key(app: &AppName) -> String {
    app.as_str().to_string()
}

/// Object key holding an application's deploy history for one environment.
pub fn deploy_key(app: &AppName, environment: &EnvironmentName) -> String {
    format!("{app}/{environment}")
}

/// Immutable description of one buildable state of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
    pub version: ReleaseVersion,
    pub author: String,
    pub commit: CommitHash,
    pub image: ImageId,
    pub changelog: String,
    pub timestamp: DateTime<Utc>,
    /// The commit is behind the one in the previous release.
    pub rollback: bool,
}

/// A release made active in an environment. Release fields are copied so the
/// record stands on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployRecord {
    #[serde(flatten)]
    pub release: ReleaseRecord,
    pub environment: EnvironmentName,
}

impl DeployRecord {
    pub fn from_release(release: &ReleaseRecord, environment: EnvironmentName) -> Self {
        Self {
            release: release.clone(),
            environment,
        }
    }
}

/// Encoding shared by both record kinds.
pub trait LedgerRecord: Sized + Serialize {
    fn version(&self) -> ReleaseVersion;

    fn decode(body: &[u8], meta: &ObjectMeta) -> Result<Self, LedgerError>;

    fn encode(&self) -> Result<Bytes, LedgerError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(LedgerError::Encode)
    }
}

/// Lenient view of a stored object. Entries written by older tooling may
/// lack a timestamp or changelog.
#[derive(Debug, Deserialize)]
struct WireRecord {
    version: ReleaseVersion,
    author: String,
    commit: CommitHash,
    #[serde(default)]
    image: Option<ImageId>,
    #[serde(default)]
    changelog: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    rollback: bool,
    #[serde(default)]
    environment: Option<EnvironmentName>,
}

impl WireRecord {
    fn parse(body: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(body).map_err(|e| LedgerError::InvalidRecord(e.to_string()))
    }

    fn into_release(self, meta: &ObjectMeta) -> Result<ReleaseRecord, LedgerError> {
        let timestamp = self
            .timestamp
            .or(meta.last_modified)
            .ok_or_else(|| LedgerError::InvalidRecord("record has no timestamp".to_string()))?;

        Ok(ReleaseRecord {
            version: self.version,
            author: self.author,
            commit: self.commit,
            image: self.image.unwrap_or_else(ImageId::none),
            changelog: self
                .changelog
                .unwrap_or_else(|| CHANGELOG_UNAVAILABLE.to_string()),
            timestamp,
            rollback: self.rollback,
        })
    }
}

impl LedgerRecord for ReleaseRecord {
    fn version(&self) -> ReleaseVersion {
        self.version
    }

    fn decode(body: &[u8], meta: &ObjectMeta) -> Result<Self, LedgerError> {
        WireRecord::parse(body)?.into_release(meta)
    }
}

impl LedgerRecord for DeployRecord {
    fn version(&self) -> ReleaseVersion {
        self.release.version
    }

    fn decode(body: &[u8], meta: &ObjectMeta) -> Result<Self, LedgerError> {
        let mut wire = WireRecord::parse(body)?;
        let environment = wire.environment.take().ok_or_else(|| {
            LedgerError::InvalidRecord("deploy record has no environment".to_string())
        })?;
        Ok(DeployRecord {
            release: wire.into_release(meta)?,
            environment,
        })
    }
}

/// A record together with the identity the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored<R> {
    pub record: R,
    pub version_id: ObjectVersionId,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl<R: LedgerRecord> Stored<R> {
    pub fn from_object(object: &StoredObject) -> Result<Self, LedgerError> {
        Ok(Self {
            record: R::decode(&object.body, &object.meta)?,
            version_id: object.meta.version_id.clone(),
            etag: object.meta.etag.clone(),
            last_modified: object.meta.last_modified,
        })
    }

    pub fn version(&self) -> ReleaseVersion {
        self.record.version()
    }
}

/// What a consumer compares to detect a new release: the version alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseIdentity {
    pub version: ReleaseVersion,
}

/// What a consumer compares to detect a new deploy. The same version can be
/// deployed repeatedly, so the store's version id is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeployIdentity {
    pub version: ReleaseVersion,
    pub version_id: ObjectVersionId,
}

impl Stored<ReleaseRecord> {
    pub fn identity(&self) -> ReleaseIdentity {
        ReleaseIdentity {
            version: self.record.version,
        }
    }
}

impl Stored<DeployRecord> {
    pub fn identity(&self) -> DeployIdentity {
        DeployIdentity {
            version: self.record.release.version,
            version_id: self.version_id.clone(),
        }
    }
}
