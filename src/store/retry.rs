// ABOUTME: Retry and timeout decorator for object stores.
// ABOUTME: Bounded exponential backoff applies to transient failures only.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use super::{ObjectLedgerStore, ObjectMeta, StoreError, StoredObject, WriteCondition};
use crate::types::ObjectVersionId;

/// How storage calls are bounded and retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Ceiling for a single attempt.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Wraps a store so every call is time-boxed and transient failures retried.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectLedgerStore> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.policy.timeout)),
        }
    }

    async fn backoff(&self, op: &str, key: &str, attempt: u32, err: &StoreError) {
        let delay = self.policy.delay_for(attempt);
        tracing::warn!(
            bucket = self.inner.bucket(),
            key,
            op,
            attempt,
            "retrying in {:?} after error: {}",
            delay,
            err
        );
        tokio::time::sleep(delay).await;
    }

    async fn run<T, F, Fut>(&self, op: &str, key: &str, call: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.bounded(call()).await {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    self.backoff(op, key, attempt, &err).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// The head of `key`, if it is the write of `body` under `condition`.
    ///
    /// A put that failed with a transient error may still have been stored.
    /// Under `IfMatch` an unchanged head etag means nothing was written.
    async fn landed(
        &self,
        key: &str,
        body: &Bytes,
        condition: &WriteCondition,
    ) -> Option<ObjectMeta> {
        let head = match self.bounded(self.inner.get(key, None)).await {
            Ok(head) => head,
            Err(err) => {
                tracing::debug!(key, error = %err, "could not check for an earlier write");
                return None;
            }
        };

        let unchanged = matches!(
            condition,
            WriteCondition::IfMatch(etag) if head.meta.etag.as_deref() == Some(etag.as_str())
        );
        if unchanged || head.body != *body {
            return None;
        }

        tracing::info!(
            bucket = self.inner.bucket(),
            key,
            version_id = %head.meta.version_id,
            "earlier write landed despite the error"
        );
        Some(head.meta)
    }

    /// Puts are not idempotent, so before each retry the head is checked for
    /// the body already sent.
    async fn put_once(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self
                .bounded(self.inner.put(key, body.clone(), condition.clone()))
                .await;
            match result {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    self.backoff("put", key, attempt, &err).await;
                    attempt += 1;
                    if let Some(meta) = self.landed(key, &body, &condition).await {
                        return Ok(meta);
                    }
                }
                // Our own earlier attempt may be what moved the head.
                Err(err @ StoreError::PreconditionFailed(_)) if attempt > 1 => {
                    return match self.landed(key, &body, &condition).await {
                        Some(meta) => Ok(meta),
                        None => Err(err),
                    };
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: ObjectLedgerStore> ObjectLedgerStore for Retrying<S> {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn get(
        &self,
        key: &str,
        version_id: Option<&ObjectVersionId>,
    ) -> Result<StoredObject, StoreError> {
        self.run("get", key, || self.inner.get(key, version_id)).await
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: WriteCondition,
    ) -> Result<ObjectMeta, StoreError> {
        self.put_once(key, body, condition).await
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        self.run("list_versions", key, || self.inner.list_versions(key))
            .await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.run("list_keys", "", || self.inner.list_keys()).await
    }
}
