// ABOUTME: Command module aggregator for the catapult CLI.
// ABOUTME: Re-exports release, deploy, projects, and resource handlers.

mod connect;
mod deploy;
mod projects;
mod release;
mod resource;

pub use connect::connect;
pub use deploy::{DeployStart, deploy_current, deploy_ls, deploy_start};
pub use projects::projects;
pub use release::{
    NewRelease, release_current, release_find, release_get, release_log, release_ls, release_new,
};
pub use resource::{resource_check, resource_in, resource_out};

use catapult::error::{Error, Result};
use catapult::ledger::LedgerError;
use catapult::types::{AppName, EnvironmentName, ReleaseVersion};

fn parse_app(value: &str) -> Result<AppName> {
    AppName::new(value).map_err(|e| Error::InvalidArgument(e.to_string()))
}

fn parse_environment(value: &str) -> Result<EnvironmentName> {
    EnvironmentName::new(value)
        .map_err(LedgerError::from)
        .map_err(Error::from)
}

fn parse_version(value: &str) -> Result<ReleaseVersion> {
    value
        .parse::<ReleaseVersion>()
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}
