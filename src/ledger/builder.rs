// ABOUTME: Assembles immutable release records.
// ABOUTME: Resolves symbolic commits and fills author and changelog from git.

use chrono::Utc;

use super::{LedgerError, ReleaseRecord};
use crate::diagnostics::{Diagnostics, Warning};
use crate::git::GitAdapter;
use crate::types::{CommitHash, ImageId, ReleaseVersion};

/// Caller-supplied inputs for a new release.
#[derive(Debug, Clone)]
pub struct ReleaseDraft {
    /// Commit hash or symbolic reference such as `HEAD`.
    pub commit_ref: String,
    /// Empty for applications that produce no image.
    pub image: ImageId,
    /// Computed from git history when absent.
    pub changelog: Option<String>,
    /// Taken from git configuration when absent.
    pub author: Option<String>,
}

impl ReleaseDraft {
    pub fn new(commit_ref: impl Into<String>, image: ImageId) -> Self {
        Self {
            commit_ref: commit_ref.into(),
            image,
            changelog: None,
            author: None,
        }
    }

    pub fn changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = Some(changelog.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

impl Default for ReleaseDraft {
    fn default() -> Self {
        Self::new("HEAD", ImageId::none())
    }
}

/// Full hashes are taken as given; anything else goes through git.
pub(crate) async fn resolve_commit<G: GitAdapter + ?Sized>(
    git: &G,
    reference: &str,
) -> Result<CommitHash, LedgerError> {
    match CommitHash::new(reference) {
        Ok(hash) => Ok(hash),
        Err(_) => Ok(git.resolve(reference).await?),
    }
}

pub struct ReleaseRecordBuilder<'a, G: ?Sized> {
    git: &'a G,
}

impl<'a, G: GitAdapter + ?Sized> ReleaseRecordBuilder<'a, G> {
    pub fn new(git: &'a G) -> Self {
        Self { git }
    }

    /// Build the record for `version`. `previous` is the release it follows,
    /// used to compute the changelog and rollback flag.
    pub async fn build(
        &self,
        version: ReleaseVersion,
        draft: &ReleaseDraft,
        previous: Option<&ReleaseRecord>,
        diag: &mut Diagnostics,
    ) -> Result<ReleaseRecord, LedgerError> {
        let commit = resolve_commit(self.git, &draft.commit_ref).await?;

        let author = match draft.author.as_deref().map(str::trim) {
            Some(author) if !author.is_empty() => author.to_string(),
            _ => self
                .git
                .author()
                .await?
                .ok_or(LedgerError::MissingField("author"))?,
        };

        let (changelog, rollback) = match &draft.changelog {
            Some(text) => {
                let rollback = match previous {
                    Some(prev) => self.is_rollback(&commit, &prev.commit, diag).await,
                    None => false,
                };
                (text.clone(), rollback)
            }
            None => {
                let from = previous.map(|p| &p.commit);
                match self.git.changelog(from, &commit).await {
                    Ok(changelog) => (changelog.text, changelog.rollback),
                    Err(err) => {
                        diag.warn(Warning::changelog_unavailable(format!(
                            "could not compute changelog for {commit}: {err}"
                        )));
                        (String::new(), false)
                    }
                }
            }
        };

        Ok(ReleaseRecord {
            version,
            author,
            commit,
            image: draft.image.clone(),
            changelog,
            timestamp: Utc::now(),
            rollback,
        })
    }

    /// `commit` sits behind `previous` in history.
    async fn is_rollback(
        &self,
        commit: &CommitHash,
        previous: &CommitHash,
        diag: &mut Diagnostics,
    ) -> bool {
        if commit == previous {
            return false;
        }
        match self.git.is_ancestor(commit, previous).await {
            Ok(behind) => behind,
            Err(err) => {
                diag.warn(Warning::changelog_unavailable(format!(
                    "could not compare {commit} with {previous}: {err}"
                )));
                false
            }
        }
    }
}
