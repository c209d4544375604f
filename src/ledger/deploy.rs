// ABOUTME: Deploy recording against an environment-scoped ledger key.
// ABOUTME: Every deploy appends a new object version, including re-deploys.

use super::history::{Head, History};
use super::record::{deploy_key, release_key};
use super::release::find_release;
use super::{DeployRecord, LedgerError, LedgerRecord, ReleaseRecord, Stored};
use crate::store::{ObjectLedgerStore, StoreError, WriteCondition};
use crate::types::{AppName, EnvironmentName, ReleaseVersion};

/// A deploy that has been resolved against release history but not written.
#[derive(Debug, Clone)]
pub struct PendingDeploy {
    pub app: AppName,
    pub record: DeployRecord,
    /// Deploy currently active in the environment, if any.
    pub previous: Option<Stored<DeployRecord>>,
    condition: WriteCondition,
}

impl PendingDeploy {
    /// The target is older than what the environment currently runs.
    pub fn is_rollback(&self) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|prev| self.record.release.version < prev.version())
    }
}

/// Records deploys of releases into environments.
pub struct DeployLedger<S> {
    releases: S,
    deploys: S,
    max_write_attempts: u32,
}

impl<S: ObjectLedgerStore> DeployLedger<S> {
    /// `releases` is read to find the target; `deploys` receives the records.
    pub fn new(releases: S, deploys: S) -> Self {
        Self {
            releases,
            deploys,
            max_write_attempts: 5,
        }
    }

    /// Attempts at writing a deploy while other deploys keep landing first.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Record a deploy of `target_version` (or the latest release) into
    /// `environment`.
    pub async fn create_deploy(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
        target_version: Option<ReleaseVersion>,
    ) -> Result<Stored<DeployRecord>, LedgerError> {
        let pending = self.prepare_deploy(app, environment, target_version).await?;
        self.commit_deploy(pending).await
    }

    /// Resolve the target release and build the deploy record.
    pub async fn prepare_deploy(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
        target_version: Option<ReleaseVersion>,
    ) -> Result<PendingDeploy, LedgerError> {
        let release = match target_version {
            Some(version) => find_release(&self.releases, app, version).await?,
            None => {
                let key = release_key(app);
                History::new(&self.releases, &key)
                    .latest::<ReleaseRecord>()
                    .await?
                    .ok_or_else(|| LedgerError::NoReleases(app.clone()))?
            }
        };

        let key = deploy_key(app, environment);
        let head = History::new(&self.deploys, &key).head().await?;

        tracing::debug!(
            %app,
            %environment,
            version = %release.version(),
            release_version_id = %release.version_id,
            "resolved deploy target"
        );

        Ok(PendingDeploy {
            app: app.clone(),
            record: DeployRecord::from_release(&release.record, environment.clone()),
            condition: head.write_condition(),
            previous: head.record,
        })
    }

    /// Append the deploy record. Identical content still produces a new
    /// object version so re-deploys stay individually observable.
    ///
    /// The write is conditional on the environment head seen when the deploy
    /// was prepared. If another deploy lands in between, the head is re-read
    /// and the same record written on top of it.
    pub async fn commit_deploy(
        &self,
        mut pending: PendingDeploy,
    ) -> Result<Stored<DeployRecord>, LedgerError> {
        let key = deploy_key(&pending.app, &pending.record.environment);
        let body = pending.record.encode()?;
        let attempts = self.max_write_attempts.max(1);
        let mut attempt = 1;

        let meta = loop {
            let condition = pending.condition.clone();
            match self.deploys.put(&key, body.clone(), condition).await {
                Ok(meta) => break meta,
                Err(StoreError::PreconditionFailed(_)) if attempt < attempts => {
                    tracing::warn!(
                        app = %pending.app,
                        environment = %pending.record.environment,
                        attempt,
                        "another deploy landed first, retrying"
                    );
                    attempt += 1;
                    let head: Head<DeployRecord> = History::new(&self.deploys, &key).head().await?;
                    pending.condition = head.write_condition();
                    pending.previous = head.record;
                }
                Err(StoreError::PreconditionFailed(_)) => {
                    return Err(LedgerError::DeployConflict {
                        app: pending.app,
                        environment: pending.record.environment,
                        attempts,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        };

        tracing::info!(
            app = %pending.app,
            environment = %pending.record.environment,
            version = %pending.record.release.version,
            version_id = %meta.version_id,
            "deploy written"
        );

        Ok(Stored {
            record: pending.record,
            version_id: meta.version_id,
            etag: meta.etag,
            last_modified: meta.last_modified,
        })
    }

    /// Deploy history for an environment, newest first.
    pub async fn deploys(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
        limit: Option<usize>,
    ) -> Result<Vec<Stored<DeployRecord>>, LedgerError> {
        let key = deploy_key(app, environment);
        History::new(&self.deploys, &key)
            .collect(limit, |_: &Stored<DeployRecord>| false)
            .await
    }
}
