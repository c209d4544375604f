// ABOUTME: Resource adapter error types with SNAFU pattern.
// ABOUTME: Unifies source validation, ledger, and file output failures.

use std::path::PathBuf;

use snafu::Snafu;

use crate::ledger::{LedgerError, LedgerErrorKind};

/// Unified error for check, fetch, and publish.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResourceError {
    #[snafu(display("missing required parameter: {name}"))]
    MissingParameter { name: &'static str },

    #[snafu(display("invalid {field} in version: {value:?}"))]
    InvalidVersion { field: &'static str, value: String },

    #[snafu(display("invalid environment: {source}"))]
    InvalidEnvironment { source: LedgerError },

    #[snafu(display("ledger operation failed: {source}"))]
    Ledger { source: LedgerError },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to encode metadata: {source}"))]
    Encode { source: serde_json::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    /// Source or params lack something the operation needs.
    MissingRequiredParameter,
    /// A version handed back by the pipeline does not parse.
    InvalidVersion,
    /// Source or params name an unusable environment.
    InvalidEnvironment,
    /// The requested release or deploy does not exist.
    NotFound,
    /// Storage, git, or record failure.
    Ledger,
    /// Local file input or output failed.
    Io,
}

impl ResourceError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ResourceErrorKind {
        match self {
            ResourceError::MissingParameter { .. } => ResourceErrorKind::MissingRequiredParameter,
            ResourceError::InvalidVersion { .. } => ResourceErrorKind::InvalidVersion,
            ResourceError::InvalidEnvironment { .. } => ResourceErrorKind::InvalidEnvironment,
            ResourceError::Ledger { source } => match source.kind() {
                LedgerErrorKind::MissingRequiredParameter => {
                    ResourceErrorKind::MissingRequiredParameter
                }
                LedgerErrorKind::ReleaseNotFound | LedgerErrorKind::NotFound => {
                    ResourceErrorKind::NotFound
                }
                _ => ResourceErrorKind::Ledger,
            },
            ResourceError::ReadFile { .. }
            | ResourceError::WriteFile { .. }
            | ResourceError::Encode { .. } => ResourceErrorKind::Io,
        }
    }
}

impl From<LedgerError> for ResourceError {
    fn from(source: LedgerError) -> Self {
        ResourceError::Ledger { source }
    }
}
