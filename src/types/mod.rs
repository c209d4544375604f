// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod app_name;
mod commit;
mod environment;
mod id;
mod version;

pub use app_name::{AppName, AppNameError};
pub use commit::{CommitHash, CommitHashError};
pub use environment::{EnvironmentName, EnvironmentNameError};
pub use id::{Id, ImageId, ObjectVersionId};
pub use version::{ParseVersionError, ReleaseVersion};
