// ABOUTME: Amazon S3 (and S3-compatible) backend for the ledger store.
// ABOUTME: Relies on bucket versioning for history and conditional puts for CAS.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{
    ObjectLedgerStore, ObjectMeta, StoreError, StoreErrorKind, StoredObject, WriteCondition,
    sort_newest_first,
};
use crate::types::ObjectVersionId;

/// One versioned S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn require_version(&self, version_id: Option<&str>) -> Result<ObjectVersionId, StoreError> {
        match version_id {
            Some(id) if id != "null" => Ok(ObjectVersionId::new(id)),
            // Objects written before versioning was enabled report "null".
            _ => Err(StoreError::Unversioned(self.bucket.clone())),
        }
    }
}

#[async_trait]
impl ObjectLedgerStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(
        &self,
        key: &str,
        version_id: Option<&ObjectVersionId>,
    ) -> Result<StoredObject, StoreError> {
        tracing::debug!(bucket = %self.bucket, key, version = ?version_id, "GetObject");

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_version_id(version_id.map(|v| v.as_str().to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let meta = ObjectMeta {
            version_id: self.require_version(resp.version_id())?,
            etag: resp.e_tag().map(str::to_string),
            last_modified: resp.last_modified().and_then(to_chrono),
            is_latest: version_id.is_none(),
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Transient(format!("reading body of {key}: {e}")))?
            .into_bytes();

        Ok(StoredObject { body, meta })
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError> {
        tracing::debug!(bucket = %self.bucket, key, ?condition, "PutObject");

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body));

        request = match condition {
            WriteCondition::Unconditional => request,
            WriteCondition::IfAbsent => request.if_none_match("*"),
            WriteCondition::IfMatch(etag) => request.if_match(etag),
        };

        let resp = request.send().await.map_err(|e| map_sdk_error(key, e))?;

        Ok(ObjectMeta {
            version_id: self.require_version(resp.version_id())?,
            etag: resp.e_tag().map(str::to_string),
            last_modified: Some(Utc::now()),
            is_latest: true,
        })
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let mut versions = Vec::new();
        let mut key_marker = None;
        let mut version_marker = None;

        loop {
            let resp = self
                .client
                .list_object_versions()
                .bucket(&self.bucket)
                .prefix(key)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(key, e))?;

            // The prefix also matches "<key>/..." children, e.g. deploy keys
            // under an application name in a shared bucket.
            for version in resp.versions().iter().filter(|v| v.key() == Some(key)) {
                let Some(id) = version.version_id().filter(|id| *id != "null") else {
                    tracing::warn!(bucket = %self.bucket, key, "skipping unversioned object");
                    continue;
                };
                versions.push(ObjectMeta {
                    version_id: ObjectVersionId::new(id),
                    etag: version.e_tag().map(str::to_string),
                    last_modified: version.last_modified().and_then(to_chrono),
                    is_latest: version.is_latest().unwrap_or(false),
                });
            }

            if !resp.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = resp.next_key_marker().map(str::to_string);
            version_marker = resp.next_version_id_marker().map(str::to_string);
            if key_marker.is_none() {
                break;
            }
        }

        sort_newest_first(&mut versions);
        Ok(versions)
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut token = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(&self.bucket, e))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn to_chrono(ts: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

fn map_sdk_error<E>(key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = format!("{key}: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient(detail)
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            match classify_service_error(service.err().code(), status) {
                StoreErrorKind::NotFound => StoreError::NotFound(key.to_string()),
                StoreErrorKind::AccessDenied => StoreError::AccessDenied(detail),
                StoreErrorKind::PreconditionFailed => {
                    StoreError::PreconditionFailed(key.to_string())
                }
                StoreErrorKind::Transient | StoreErrorKind::Timeout => {
                    StoreError::Transient(detail)
                }
                StoreErrorKind::Unversioned | StoreErrorKind::Backend => {
                    StoreError::Backend(detail)
                }
            }
        }
        _ => StoreError::Backend(detail),
    }
}

/// Map an S3 error code and HTTP status onto a store error category.
pub fn classify_service_error(code: Option<&str>, status: u16) -> StoreErrorKind {
    match code {
        Some("NoSuchKey" | "NoSuchVersion" | "NotFound") => StoreErrorKind::NotFound,
        Some(
            "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "InvalidToken",
        ) => StoreErrorKind::AccessDenied,
        Some("PreconditionFailed" | "ConditionalRequestConflict") => {
            StoreErrorKind::PreconditionFailed
        }
        Some("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout") => {
            StoreErrorKind::Transient
        }
        _ => match status {
            404 => StoreErrorKind::NotFound,
            403 => StoreErrorKind::AccessDenied,
            409 | 412 => StoreErrorKind::PreconditionFailed,
            429 | 500..=599 => StoreErrorKind::Transient,
            _ => StoreErrorKind::Backend,
        },
    }
}
