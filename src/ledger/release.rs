// ABOUTME: Release creation and lookup.
// ABOUTME: Appends release records under the application key and tags the commit.

use serde::Deserialize;

use super::builder::{ReleaseDraft, ReleaseRecordBuilder, resolve_commit};
use super::history::History;
use super::range::{RangeEnd, ReleaseRange};
use super::record::release_key;
use super::version::VersionResolver;
use super::{LedgerError, LedgerRecord, ReleaseRecord, Stored};
use crate::diagnostics::{Diagnostics, Warning};
use crate::git::{Changelog, GitAdapter, GitError};
use crate::store::{ObjectLedgerStore, WriteCondition};
use crate::types::{AppName, CommitHash, ReleaseVersion};

/// How concurrent release writers are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    /// Conditional writes; a lost race re-resolves the version and retries.
    #[default]
    Optimistic,
    /// Unconditional writes. Two racing writers may both claim the same
    /// version; the later object version wins and the other is orphaned.
    AcceptRace,
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub concurrency: ConcurrencyMode,
    /// Attempts at an optimistic write before giving up.
    pub max_write_attempts: u32,
    /// Create `<app>-v<version>` tags after writing.
    pub create_tags: bool,
    /// Record releases whose commit is behind the previous release. The CLI
    /// turns this off unless `--rollback` is given.
    pub allow_rollback: bool,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::Optimistic,
            max_write_attempts: 5,
            create_tags: true,
            allow_rollback: true,
        }
    }
}

/// A fully built release that has not been written yet.
#[derive(Debug)]
pub struct PendingRelease {
    pub app: AppName,
    pub record: ReleaseRecord,
    pub previous: Option<Stored<ReleaseRecord>>,
    condition: WriteCondition,
    explicit_version: bool,
    pub diagnostics: Diagnostics,
}

/// Result of writing a release.
#[derive(Debug)]
pub struct ReleaseOutcome {
    pub release: Stored<ReleaseRecord>,
    /// Tag name, when one was created.
    pub tag: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Writes and reads an application's release history.
pub struct ReleaseLedger<S, G> {
    store: S,
    git: G,
    options: ReleaseOptions,
}

impl<S: ObjectLedgerStore, G: GitAdapter> ReleaseLedger<S, G> {
    pub fn new(store: S, git: G) -> Self {
        Self::with_options(store, git, ReleaseOptions::default())
    }

    pub fn with_options(store: S, git: G, options: ReleaseOptions) -> Self {
        Self { store, git, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create and persist a new release.
    ///
    /// Without an explicit version the next version is derived from history.
    /// In optimistic mode a concurrent writer that lands first causes the
    /// version to be re-resolved, up to `max_write_attempts` times. A rollback
    /// is refused unless `allow_rollback` is set.
    pub async fn create_release(
        &self,
        app: &AppName,
        draft: &ReleaseDraft,
        explicit_version: Option<ReleaseVersion>,
    ) -> Result<ReleaseOutcome, LedgerError> {
        let attempts = self.options.max_write_attempts.max(1);
        let mut attempt = 1;
        loop {
            let pending = self.prepare_release(app, draft, explicit_version).await?;
            if pending.record.rollback {
                if !self.options.allow_rollback {
                    return Err(LedgerError::RollbackNotConfirmed {
                        app: app.clone(),
                        version: pending.record.version,
                        commit: pending.record.commit.clone(),
                    });
                }
                tracing::warn!(
                    %app,
                    version = %pending.record.version,
                    commit = %pending.record.commit,
                    "recording a rollback release"
                );
            }
            match self.commit_release(pending).await {
                Err(err) if err.is_precondition_failed() && attempt < attempts => {
                    tracing::warn!(%app, attempt, "another release landed first, retrying");
                    attempt += 1;
                }
                Err(err) if err.is_precondition_failed() => {
                    return Err(LedgerError::VersionConflict {
                        app: app.clone(),
                        attempts,
                    });
                }
                other => return other,
            }
        }
    }

    /// Resolve the version and build the record without writing anything.
    pub async fn prepare_release(
        &self,
        app: &AppName,
        draft: &ReleaseDraft,
        explicit_version: Option<ReleaseVersion>,
    ) -> Result<PendingRelease, LedgerError> {
        let next = VersionResolver::new(&self.store).resolve(app).await?;
        let version = explicit_version.unwrap_or(next.version);

        let condition = match (explicit_version, self.options.concurrency) {
            (Some(_), _) | (None, ConcurrencyMode::AcceptRace) => WriteCondition::Unconditional,
            (None, ConcurrencyMode::Optimistic) => next.condition,
        };

        let mut diagnostics = Diagnostics::default();
        let record = ReleaseRecordBuilder::new(&self.git)
            .build(
                version,
                draft,
                next.previous.as_ref().map(|p| &p.record),
                &mut diagnostics,
            )
            .await?;

        Ok(PendingRelease {
            app: app.clone(),
            record,
            previous: next.previous,
            condition,
            explicit_version: explicit_version.is_some(),
            diagnostics,
        })
    }

    /// Write a prepared release, then tag its commit.
    ///
    /// A tag failure is reported in the outcome's diagnostics and never undoes
    /// the write: the ledger is the source of truth.
    pub async fn commit_release(
        &self,
        pending: PendingRelease,
    ) -> Result<ReleaseOutcome, LedgerError> {
        let PendingRelease {
            app,
            record,
            condition,
            explicit_version,
            mut diagnostics,
            ..
        } = pending;

        let key = release_key(&app);
        let meta = self.store.put(&key, record.encode()?, condition).await?;

        tracing::info!(
            %app,
            version = %record.version,
            version_id = %meta.version_id,
            explicit = explicit_version,
            "release written"
        );

        let tag = if self.options.create_tags {
            self.tag(&app, &record, &mut diagnostics).await
        } else {
            None
        };

        Ok(ReleaseOutcome {
            release: Stored {
                record,
                version_id: meta.version_id,
                etag: meta.etag,
                last_modified: meta.last_modified,
            },
            tag,
            diagnostics,
        })
    }

    async fn tag(
        &self,
        app: &AppName,
        record: &ReleaseRecord,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let name = record.version.tag_for(app);
        match self.git.create_tag(&name, &record.commit).await {
            Ok(()) => Some(name),
            Err(GitError::TagAlreadyExists(_)) => {
                diagnostics.warn(Warning::tag_conflict(format!(
                    "tag {name} already exists; release v{} was still recorded",
                    record.version
                )));
                None
            }
            Err(err) => {
                diagnostics.warn(Warning::tag_failed(format!(
                    "could not tag {name}: {err}; release v{} was still recorded",
                    record.version
                )));
                None
            }
        }
    }

    /// Release history, newest first.
    pub async fn releases(
        &self,
        app: &AppName,
        limit: Option<usize>,
    ) -> Result<Vec<Stored<ReleaseRecord>>, LedgerError> {
        let key = release_key(app);
        History::new(&self.store, &key)
            .collect(limit, |_: &Stored<ReleaseRecord>| false)
            .await
    }

    /// The newest record carrying `version`.
    pub async fn release(
        &self,
        app: &AppName,
        version: ReleaseVersion,
    ) -> Result<Stored<ReleaseRecord>, LedgerError> {
        find_release(&self.store, app, version).await
    }

    /// The earliest release whose commit contains `commit_ref`.
    ///
    /// Among releases of the same commit the oldest write wins. Releases whose
    /// commit is unknown to the local repository are skipped.
    pub async fn release_containing(
        &self,
        app: &AppName,
        commit_ref: &str,
    ) -> Result<Stored<ReleaseRecord>, LedgerError> {
        let commit = resolve_commit(&self.git, commit_ref).await?;
        let history = self.releases(app, None).await?;

        let mut earliest: Option<Stored<ReleaseRecord>> = None;
        for release in history.into_iter().rev() {
            if !self.contains(&release.record.commit, &commit).await {
                continue;
            }
            let replace = match &earliest {
                None => true,
                Some(current) => {
                    current.record.commit != release.record.commit
                        && self.contains(&current.record.commit, &release.record.commit).await
                }
            };
            if replace {
                earliest = Some(release);
            }
        }

        earliest.ok_or_else(|| LedgerError::CommitNotReleased {
            app: app.clone(),
            commit,
        })
    }

    async fn contains(&self, release_commit: &CommitHash, commit: &CommitHash) -> bool {
        match self.git.is_ancestor(commit, release_commit).await {
            Ok(contained) => contained,
            Err(err) => {
                tracing::warn!(%release_commit, "skipping release: {}", err);
                false
            }
        }
    }

    /// Both ends of `range` as git refs, release versions replaced by the
    /// commits they recorded.
    pub async fn resolve_range(
        &self,
        app: &AppName,
        range: &ReleaseRange,
    ) -> Result<(String, String), LedgerError> {
        let start = self.range_end(app, &range.start).await?;
        let end = self.range_end(app, &range.end).await?;
        Ok((start, end))
    }

    async fn range_end(&self, app: &AppName, end: &RangeEnd) -> Result<String, LedgerError> {
        match end {
            RangeEnd::Release(version) => Ok(self
                .release(app, *version)
                .await?
                .record
                .commit
                .to_string()),
            RangeEnd::Ref(name) => Ok(name.clone()),
        }
    }

    /// Commit log between the two ends of `range`.
    pub async fn range_changelog(
        &self,
        app: &AppName,
        range: &ReleaseRange,
    ) -> Result<Changelog, LedgerError> {
        let (start, end) = self.resolve_range(app, range).await?;
        let start = resolve_commit(&self.git, &start).await?;
        let end = resolve_commit(&self.git, &end).await?;
        Ok(self.git.changelog(Some(&start), &end).await?)
    }
}

/// Scan release history newest first for `version`.
pub(crate) async fn find_release<S: ObjectLedgerStore + ?Sized>(
    store: &S,
    app: &AppName,
    version: ReleaseVersion,
) -> Result<Stored<ReleaseRecord>, LedgerError> {
    let key = release_key(app);
    History::new(store, &key)
        .find(|stored: &Stored<ReleaseRecord>| stored.version() == version)
        .await?
        .ok_or_else(|| LedgerError::ReleaseNotFound {
            app: app.clone(),
            version,
        })
}
