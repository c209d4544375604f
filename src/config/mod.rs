// ABOUTME: Configuration types and parsing for catapult.yml.
// ABOUTME: Discovers the file upwards, resolves env references, and applies overrides.

mod env_value;
mod init;

pub use env_value::{EnvValue, resolve_optional};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::git::DEFAULT_GIT_TIMEOUT;
use crate::ledger::{ConcurrencyMode, ReleaseOptions};
use crate::store::RetryPolicy;
use crate::types::EnvironmentName;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "catapult.yml";
pub const CONFIG_FILENAME_ALT: &str = "catapult.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".catapult/config.yml";

pub const ENV_AWS_PROFILE: &str = "CATAPULT_AWS_PROFILE";
pub const ENV_MFA_DEVICE: &str = "CATAPULT_AWS_MFA_DEVICE";
pub const ENV_RELEASE_BUCKET: &str = "CATAPULT_RELEASE_BUCKET";
pub const ENV_DEPLOY_BUCKET: &str = "CATAPULT_DEPLOY_BUCKET";

/// The file as written, before env references are resolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub release_bucket: Option<EnvValue>,

    #[serde(default)]
    pub deploy_bucket: Option<EnvValue>,

    #[serde(default)]
    pub aws_profile: Option<EnvValue>,

    #[serde(default)]
    pub mfa_device: Option<EnvValue>,

    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<EnvValue>,

    #[serde(default)]
    pub environments: Vec<EnvironmentName>,

    #[serde(default)]
    pub concurrency: ConcurrencyMode,

    /// Conditional writes attempted before a conflicting release or deploy
    /// gives up.
    #[serde(default)]
    pub max_write_attempts: Option<u32>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub git: GitConfig,
}


#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitConfig {
    /// Remote that release tags are pushed to. `null` keeps tags local.
    #[serde(default = "default_remote")]
    pub remote: Option<String>,

    /// Tag each release as `<app>-v<version>`.
    #[serde(default = "default_tag")]
    pub tag: bool,

    /// Ceiling for a single git invocation.
    #[serde(default = "default_git_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            tag: default_tag(),
            timeout: default_git_timeout(),
        }
    }
}

fn default_git_timeout() -> Duration {
    DEFAULT_GIT_TIMEOUT
}

fn default_remote() -> Option<String> {
    Some("origin".to_string())
}

fn default_tag() -> bool {
    true
}

/// Values from the process environment that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub aws_profile: Option<String>,
    pub mfa_device: Option<String>,
    pub release_bucket: Option<String>,
    pub deploy_bucket: Option<String>,
}

impl EnvOverrides {
    /// Read the `CATAPULT_*` variables. Empty values count as unset.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            aws_profile: var(ENV_AWS_PROFILE),
            mfa_device: var(ENV_MFA_DEVICE),
            release_bucket: var(ENV_RELEASE_BUCKET),
            deploy_bucket: var(ENV_DEPLOY_BUCKET),
        }
    }
}

/// Fully resolved configuration, built once per invocation and passed to
/// constructors.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub release_bucket: String,
    pub deploy_bucket: Option<String>,
    pub aws_profile: Option<String>,
    pub mfa_device: Option<String>,
    pub endpoint: Option<String>,
    pub environments: Vec<EnvironmentName>,
    pub concurrency: ConcurrencyMode,
    pub max_write_attempts: u32,
    pub retry: RetryPolicy,
    pub git: GitConfig,
    /// File the configuration was read from, if any.
    pub path: Option<PathBuf>,
}

impl LedgerConfig {
    pub fn from_yaml(yaml: &str, overrides: &EnvOverrides) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::resolve(file, overrides)
    }

    pub fn load(path: &Path, overrides: &EnvOverrides) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content, overrides)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find a config file in `dir` or its ancestors. Without one, the
    /// configuration comes from the environment alone.
    pub fn discover(dir: &Path, overrides: &EnvOverrides) -> Result<Self> {
        match find_config(dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using config file");
                Self::load(&path, overrides)
            }
            None => Self::resolve(ConfigFile::default(), overrides),
        }
    }

    pub fn resolve(file: ConfigFile, overrides: &EnvOverrides) -> Result<Self> {
        let pick = |over: &Option<String>, value: Option<&EnvValue>| -> Result<Option<String>> {
            match over {
                Some(v) => Ok(Some(v.clone())),
                None => resolve_optional(value),
            }
        };

        let release_bucket = pick(&overrides.release_bucket, file.release_bucket.as_ref())?
            .ok_or(Error::MissingRequiredParameter("release_bucket"))?;

        Ok(Self {
            release_bucket,
            deploy_bucket: pick(&overrides.deploy_bucket, file.deploy_bucket.as_ref())?,
            aws_profile: pick(&overrides.aws_profile, file.aws_profile.as_ref())?,
            mfa_device: pick(&overrides.mfa_device, file.mfa_device.as_ref())?,
            endpoint: resolve_optional(file.endpoint.as_ref())?,
            environments: file.environments,
            concurrency: file.concurrency,
            max_write_attempts: file
                .max_write_attempts
                .unwrap_or(ReleaseOptions::default().max_write_attempts),
            retry: file.retry,
            git: file.git,
            path: None,
        })
    }

    /// Deploy bucket, required by every deploy operation.
    pub fn deploy_bucket(&self) -> Result<&str> {
        self.deploy_bucket
            .as_deref()
            .ok_or(Error::MissingRequiredParameter("deploy_bucket"))
    }

    pub fn release_options(&self) -> ReleaseOptions {
        ReleaseOptions {
            concurrency: self.concurrency,
            max_write_attempts: self.max_write_attempts,
            create_tags: self.git.tag,
            ..ReleaseOptions::default()
        }
    }
}

/// First candidate config file in `dir` or any ancestor.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    dir.ancestors().find_map(|ancestor| {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR]
            .iter()
            .map(|name| ancestor.join(name))
            .find(|path| path.is_file())
    })
}
