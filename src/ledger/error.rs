// ABOUTME: Error types for release and deploy ledger operations.
// ABOUTME: Wraps store and git failures and adds ledger-level conditions.

use crate::git::GitError;
use crate::store::{StoreError, StoreErrorKind};
use crate::types::{AppName, CommitHash, EnvironmentName, EnvironmentNameError, ReleaseVersion};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A commit reference could not be resolved.
    #[error("invalid commit: {0}")]
    InvalidCommit(#[source] GitError),

    /// A record field could not be determined.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Deploy requested against a version absent from history.
    #[error("release {app} v{version} not found")]
    ReleaseNotFound { app: AppName, version: ReleaseVersion },

    /// The application has never been released.
    #[error("no releases found for {0}")]
    NoReleases(AppName),

    /// Nothing has been deployed to the environment.
    #[error("no deploys found for {app} in {environment}")]
    NoDeploys {
        app: AppName,
        environment: EnvironmentName,
    },

    #[error("environment is required")]
    EnvironmentRequired,

    #[error("invalid environment: {0}")]
    InvalidEnvironment(EnvironmentNameError),

    /// Concurrent writers kept winning the optimistic write.
    #[error("gave up allocating a version for {app} after {attempts} conflicting writes")]
    VersionConflict { app: AppName, attempts: u32 },

    /// Concurrent deploys to the same environment kept moving its head.
    #[error("gave up recording a deploy of {app} to {environment} after {attempts} conflicting writes")]
    DeployConflict {
        app: AppName,
        environment: EnvironmentName,
        attempts: u32,
    },

    /// The new release sits behind the previous one and was not confirmed.
    #[error(
        "release {app} v{version} at {commit} would roll back the previous release; pass --rollback to confirm"
    )]
    RollbackNotConfirmed {
        app: AppName,
        version: ReleaseVersion,
        commit: CommitHash,
    },

    /// No release contains the commit.
    #[error("commit {commit} of {app} not released yet")]
    CommitNotReleased { app: AppName, commit: CommitHash },

    #[error("invalid release range '{0}': expected <start>..<end>")]
    InvalidRange(String),

    /// Configuration lacks a value required for this operation.
    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(&'static str),

    #[error("invalid ledger record: {0}")]
    InvalidRecord(String),

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Git(GitError),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    InvalidCommit,
    MissingField,
    ReleaseNotFound,
    NotFound,
    EnvironmentRequired,
    VersionConflict,
    RollbackNotConfirmed,
    InvalidRange,
    MissingRequiredParameter,
    InvalidRecord,
    AccessDenied,
    TransientIo,
    Storage,
    Git,
}

impl LedgerError {
    pub fn kind(&self) -> LedgerErrorKind {
        match self {
            LedgerError::InvalidCommit(_) => LedgerErrorKind::InvalidCommit,
            LedgerError::MissingField(_) => LedgerErrorKind::MissingField,
            LedgerError::ReleaseNotFound { .. } => LedgerErrorKind::ReleaseNotFound,
            LedgerError::NoReleases(_)
            | LedgerError::NoDeploys { .. }
            | LedgerError::CommitNotReleased { .. } => LedgerErrorKind::NotFound,
            LedgerError::EnvironmentRequired | LedgerError::InvalidEnvironment(_) => {
                LedgerErrorKind::EnvironmentRequired
            }
            LedgerError::VersionConflict { .. } | LedgerError::DeployConflict { .. } => {
                LedgerErrorKind::VersionConflict
            }
            LedgerError::RollbackNotConfirmed { .. } => LedgerErrorKind::RollbackNotConfirmed,
            LedgerError::InvalidRange(_) => LedgerErrorKind::InvalidRange,
            LedgerError::MissingRequiredParameter(_) => LedgerErrorKind::MissingRequiredParameter,
            LedgerError::InvalidRecord(_) | LedgerError::Encode(_) => {
                LedgerErrorKind::InvalidRecord
            }
            LedgerError::Store(err) => match err.kind() {
                StoreErrorKind::NotFound => LedgerErrorKind::NotFound,
                StoreErrorKind::AccessDenied => LedgerErrorKind::AccessDenied,
                StoreErrorKind::Transient | StoreErrorKind::Timeout => LedgerErrorKind::TransientIo,
                _ => LedgerErrorKind::Storage,
            },
            LedgerError::Git(_) => LedgerErrorKind::Git,
        }
    }

    pub(crate) fn is_precondition_failed(&self) -> bool {
        matches!(self, LedgerError::Store(StoreError::PreconditionFailed(_)))
    }
}

impl From<EnvironmentNameError> for LedgerError {
    fn from(err: EnvironmentNameError) -> Self {
        match err {
            EnvironmentNameError::Empty => LedgerError::EnvironmentRequired,
            other => LedgerError::InvalidEnvironment(other),
        }
    }
}

impl From<GitError> for LedgerError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::UnknownRef(_) => LedgerError::InvalidCommit(err),
            other => LedgerError::Git(other),
        }
    }
}
