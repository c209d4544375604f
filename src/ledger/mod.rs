// ABOUTME: Release and deploy ledger built on a versioned object store.
// ABOUTME: Allocates versions, writes immutable records, and resolves current state.

mod builder;
mod current;
mod deploy;
mod error;
mod history;
mod range;
mod record;
mod release;
mod version;

pub use builder::{ReleaseDraft, ReleaseRecordBuilder};
pub use current::CurrentStateResolver;
pub use deploy::{DeployLedger, PendingDeploy};
pub use error::{LedgerError, LedgerErrorKind};
pub use history::{Head, History};
pub use range::{RangeEnd, ReleaseRange};
pub use record::{
    DeployIdentity, DeployRecord, LedgerRecord, ReleaseIdentity, ReleaseRecord, Stored,
    deploy_key, release_key,
};
pub use release::{
    ConcurrencyMode, PendingRelease, ReleaseLedger, ReleaseOptions, ReleaseOutcome,
};
pub use version::{NextVersion, VersionResolver};
