// ABOUTME: Version control integration used by the release path.
// ABOUTME: Resolves refs, reads the author, builds changelogs, and creates tags.

mod cli;

pub use cli::{DEFAULT_GIT_TIMEOUT, GitCli};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::CommitHash;

/// Errors from version control operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("unknown git reference: {0}")]
    UnknownRef(String),

    #[error("tag already exists: {0}")]
    TagAlreadyExists(String),

    #[error("push of tag {tag} rejected: {reason}")]
    PushRejected { tag: String, reason: String },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("git {command} timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Commit log between two releases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Changelog {
    pub text: String,
    /// The new commit is behind the previous one.
    pub rollback: bool,
}

/// Version control operations the ledger depends on.
#[async_trait]
pub trait GitAdapter: Send + Sync {
    /// Resolve a symbolic or abbreviated reference to a full commit hash.
    async fn resolve(&self, reference: &str) -> Result<CommitHash, GitError>;

    /// Create an annotated tag pointing at `commit` and publish it.
    async fn create_tag(&self, name: &str, commit: &CommitHash) -> Result<(), GitError>;

    /// Identity of the person releasing, typically `user.email`.
    async fn author(&self) -> Result<Option<String>, GitError>;

    /// Whether `ancestor` is reachable from `descendant`. A commit is its own
    /// ancestor.
    async fn is_ancestor(
        &self,
        ancestor: &CommitHash,
        descendant: &CommitHash,
    ) -> Result<bool, GitError>;

    /// Commits reachable from `to` but not from `from`. When `to` is an
    /// ancestor of `from` the range is reversed and flagged as a rollback.
    async fn changelog(
        &self,
        from: Option<&CommitHash>,
        to: &CommitHash,
    ) -> Result<Changelog, GitError>;
}

#[async_trait]
impl<G: GitAdapter + ?Sized> GitAdapter for Arc<G> {
    async fn resolve(&self, reference: &str) -> Result<CommitHash, GitError> {
        (**self).resolve(reference).await
    }

    async fn create_tag(&self, name: &str, commit: &CommitHash) -> Result<(), GitError> {
        (**self).create_tag(name, commit).await
    }

    async fn author(&self) -> Result<Option<String>, GitError> {
        (**self).author().await
    }

    async fn is_ancestor(
        &self,
        ancestor: &CommitHash,
        descendant: &CommitHash,
    ) -> Result<bool, GitError> {
        (**self).is_ancestor(ancestor, descendant).await
    }

    async fn changelog(
        &self,
        from: Option<&CommitHash>,
        to: &CommitHash,
    ) -> Result<Changelog, GitError> {
        (**self).changelog(from, to).await
    }
}
