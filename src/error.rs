// ABOUTME: Application-wide error types for catapult.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::resource::ResourceError;
use crate::types::{EnvironmentName, ReleaseVersion};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "deploying v{target} to {environment} would roll back from v{current}; pass --rollback to confirm"
    )]
    RollbackNotConfirmed {
        environment: EnvironmentName,
        current: ReleaseVersion,
        target: ReleaseVersion,
    },

    #[error("AWS session error: {0}")]
    Session(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
