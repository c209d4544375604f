// ABOUTME: Read-side resolution of the current release and deploy.
// ABOUTME: Every call re-reads the store; staleness is the caller's concern.

use std::collections::HashSet;

use super::history::History;
use super::record::{deploy_key, release_key};
use super::release::find_release;
use super::{
    DeployIdentity, DeployRecord, LedgerError, ReleaseIdentity, ReleaseRecord, Stored,
};
use crate::store::ObjectLedgerStore;
use crate::types::{AppName, EnvironmentName, ObjectVersionId, ReleaseVersion};

/// Answers "what is current right now" for pollers and CLI readers.
pub struct CurrentStateResolver<'a, S: ?Sized> {
    releases: &'a S,
    deploys: Option<&'a S>,
}

impl<'a, S: ObjectLedgerStore + ?Sized> CurrentStateResolver<'a, S> {
    /// `deploys` may be omitted when only releases are read.
    pub fn new(releases: &'a S, deploys: Option<&'a S>) -> Self {
        Self { releases, deploys }
    }

    fn deploy_store(&self) -> Result<&'a S, LedgerError> {
        self.deploys
            .ok_or(LedgerError::MissingRequiredParameter("deploy bucket"))
    }

    /// Latest release of `app`.
    pub async fn current_release(
        &self,
        app: &AppName,
    ) -> Result<Stored<ReleaseRecord>, LedgerError> {
        let key = release_key(app);
        History::new(self.releases, &key)
            .latest()
            .await?
            .ok_or_else(|| LedgerError::NoReleases(app.clone()))
    }

    /// Latest deploy of `app` into `environment`.
    pub async fn current_deploy(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
    ) -> Result<Stored<DeployRecord>, LedgerError> {
        let key = deploy_key(app, environment);
        History::new(self.deploy_store()?, &key)
            .latest()
            .await?
            .ok_or_else(|| LedgerError::NoDeploys {
                app: app.clone(),
                environment: environment.clone(),
            })
    }

    /// The newest release record carrying `version`.
    pub async fn release(
        &self,
        app: &AppName,
        version: ReleaseVersion,
    ) -> Result<Stored<ReleaseRecord>, LedgerError> {
        find_release(self.releases, app, version).await
    }

    /// One specific deploy, addressed by the object version it was written as.
    pub async fn deploy(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
        version_id: &ObjectVersionId,
    ) -> Result<Stored<DeployRecord>, LedgerError> {
        let key = deploy_key(app, environment);
        let object = self.deploy_store()?.get(&key, Some(version_id)).await?;
        Stored::from_object(&object)
    }

    /// Releases with a version greater than `since`, oldest first. Where a
    /// version was written more than once the newest write wins.
    ///
    /// The scan stops at the first entry at or below `since`, so a newer
    /// version written before an older explicit re-release is not reported.
    pub async fn releases_since(
        &self,
        app: &AppName,
        since: &ReleaseIdentity,
    ) -> Result<Vec<Stored<ReleaseRecord>>, LedgerError> {
        let key = release_key(app);
        let newest_first = History::new(self.releases, &key)
            .collect(None, |stored: &Stored<ReleaseRecord>| {
                stored.version() <= since.version
            })
            .await?;

        let mut seen = HashSet::new();
        let mut newer: Vec<_> = newest_first
            .into_iter()
            .filter(|stored| seen.insert(stored.version()))
            .collect();
        newer.sort_by_key(|stored| stored.version());
        Ok(newer)
    }

    /// Deploys written after the one identified by `since`, oldest first.
    /// When `since` is no longer in history every deploy counts as newer.
    pub async fn deploys_since(
        &self,
        app: &AppName,
        environment: &EnvironmentName,
        since: &DeployIdentity,
    ) -> Result<Vec<Stored<DeployRecord>>, LedgerError> {
        let key = deploy_key(app, environment);
        let mut newer = History::new(self.deploy_store()?, &key)
            .collect(None, |stored: &Stored<DeployRecord>| {
                stored.version_id == since.version_id
            })
            .await?;
        newer.reverse();
        Ok(newer)
    }
}
