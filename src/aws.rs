// ABOUTME: AWS SDK configuration and S3 client construction.
// ABOUTME: Handles named profiles, custom endpoints, and cached MFA session tokens.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use aws_config::{BehaviorVersion, ConfigLoader, SdkConfig};
use aws_sdk_s3::config::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifetime requested for MFA session tokens.
pub const SESSION_DURATION_SECS: i32 = 36_000;

/// Cache file for the MFA session, relative to the home directory.
pub const SESSION_FILE: &str = ".catapult";

/// A cached session is not reused within this many minutes of its expiry.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

fn loader(profile: Option<&str>) -> ConfigLoader {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match profile {
        Some(profile) => loader.profile_name(profile),
        None => loader,
    }
}

/// SDK configuration from the default credential chain, optionally pinned to
/// a named profile.
pub async fn sdk_config(profile: Option<&str>) -> SdkConfig {
    loader(profile).load().await
}

/// SDK configuration backed by an MFA session token.
///
/// An unexpired session in `cache` is reused; otherwise `code` is asked for
/// the current token code and a new session is requested from STS.
pub async fn mfa_sdk_config<F>(
    profile: Option<&str>,
    mfa_device: &str,
    cache: Option<&SessionCache>,
    code: F,
) -> Result<SdkConfig>
where
    F: FnOnce() -> Result<String>,
{
    let cached = cache
        .and_then(SessionCache::load)
        .filter(|session| session.is_usable(profile, Utc::now()));

    let session = match cached {
        Some(session) => {
            tracing::debug!(expires = %session.expiration, "reusing cached MFA session");
            session
        }
        None => {
            let base = sdk_config(profile).await;
            let session = request_session(&base, profile, mfa_device, &code()?).await?;
            if let Some(cache) = cache {
                if let Err(err) = cache.store(&session) {
                    tracing::warn!(path = %cache.path().display(), error = %err, "could not cache MFA session");
                }
            }
            session
        }
    };

    Ok(loader(profile)
        .credentials_provider(session.credentials())
        .load()
        .await)
}

async fn request_session(
    base: &SdkConfig,
    profile: Option<&str>,
    mfa_device: &str,
    code: &str,
) -> Result<CachedSession> {
    let response = aws_sdk_sts::Client::new(base)
        .get_session_token()
        .duration_seconds(SESSION_DURATION_SECS)
        .serial_number(mfa_device)
        .token_code(code.trim())
        .send()
        .await
        .map_err(|err| Error::Session(DisplayErrorContext(&err).to_string()))?;

    let credentials = response
        .credentials()
        .ok_or_else(|| Error::Session("STS returned no credentials".to_string()))?;
    let expiry = credentials.expiration();
    let expiration = DateTime::from_timestamp(expiry.secs(), expiry.subsec_nanos())
        .ok_or_else(|| Error::Session("STS returned an invalid expiration".to_string()))?;

    tracing::info!(%expiration, "obtained MFA session");

    Ok(CachedSession {
        profile: profile.map(str::to_string),
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration,
    })
}

/// Build an S3 client. A custom endpoint switches to path-style addressing,
/// which S3-compatible stores generally expect.
pub fn s3_client(sdk: &SdkConfig, endpoint: Option<&str>) -> aws_sdk_s3::Client {
    let mut builder = aws_sdk_s3::config::Builder::from(sdk);
    if let Some(url) = endpoint {
        builder = builder.endpoint_url(url).force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}

/// Temporary credentials obtained with an MFA code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    #[serde(default)]
    pub profile: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl CachedSession {
    /// Issued for `profile` and not about to expire.
    pub fn is_usable(&self, profile: Option<&str>, now: DateTime<Utc>) -> bool {
        self.profile.as_deref() == profile
            && self.expiration - TimeDelta::minutes(EXPIRY_MARGIN_MINUTES) > now
    }

    fn credentials(&self) -> Credentials {
        Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            Some(self.session_token.clone()),
            Some(SystemTime::from(self.expiration)),
            "catapult-mfa",
        )
    }
}

/// JSON file holding the most recent MFA session.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.catapult`, when a home directory is known.
    pub fn default_location() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached session, if the file exists and parses.
    pub fn load(&self) -> Option<CachedSession> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "ignoring unreadable session cache");
                None
            }
        }
    }

    /// Write the session. On unix the file is created owner-only.
    pub fn store(&self, session: &CachedSession) -> Result<()> {
        use std::io::Write;

        let json = serde_json::to_string_pretty(session)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // The mode only applies on creation; an older file keeps its own.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(profile: Option<&str>, expiration: DateTime<Utc>) -> CachedSession {
        CachedSession {
            profile: profile.map(str::to_string),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration,
        }
    }

    #[test]
    fn session_usable_until_margin() {
        let now = Utc::now();
        assert!(session(None, now + TimeDelta::hours(1)).is_usable(None, now));
        assert!(!session(None, now + TimeDelta::minutes(1)).is_usable(None, now));
        assert!(!session(None, now - TimeDelta::hours(1)).is_usable(None, now));
    }

    #[test]
    fn session_bound_to_profile() {
        let now = Utc::now();
        let cached = session(Some("prod"), now + TimeDelta::hours(1));
        assert!(cached.is_usable(Some("prod"), now));
        assert!(!cached.is_usable(Some("dev"), now));
        assert!(!cached.is_usable(None, now));
    }

    #[test]
    fn cache_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join(SESSION_FILE));
        assert!(cache.load().is_none());

        let cached = session(Some("prod"), Utc::now() + TimeDelta::hours(2));
        cache.store(&cached).unwrap();
        assert_eq!(cache.load(), Some(cached));
    }

    #[cfg(unix)]
    #[test]
    fn cache_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        let cache = SessionCache::new(path.clone());
        cache
            .store(&session(None, Utc::now() + TimeDelta::hours(2)))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        cache
            .store(&session(None, Utc::now() + TimeDelta::hours(3)))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unreadable_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(SessionCache::new(path).load().is_none());
    }
}
