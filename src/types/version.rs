// ABOUTME: Monotonic release version numbers.
// ABOUTME: Versions start at 1 and render as "v<n>" in tags and listings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::AppName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseVersionError {
    #[error("release version must be a positive integer, got '{0}'")]
    Invalid(String),

    #[error("release version must be at least 1")]
    Zero,
}

/// Release version within one application's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseVersion(u64);

impl ReleaseVersion {
    pub fn new(value: u64) -> Result<Self, ParseVersionError> {
        if value == 0 {
            return Err(ParseVersionError::Zero);
        }
        Ok(Self(value))
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Git tag name for this version: `<app>-v<version>`.
    pub fn tag_for(self, app: &AppName) -> String {
        format!("{}-v{}", app, self.0)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = ParseVersionError;

    /// Accepts both `3` and `v3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let value = digits
            .parse::<u64>()
            .map_err(|_| ParseVersionError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReleaseVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        ReleaseVersion::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed() {
        assert_eq!("3".parse::<ReleaseVersion>().unwrap().get(), 3);
        assert_eq!("v12".parse::<ReleaseVersion>().unwrap().get(), 12);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_eq!("0".parse::<ReleaseVersion>(), Err(ParseVersionError::Zero));
        assert!("latest".parse::<ReleaseVersion>().is_err());
        assert!("-1".parse::<ReleaseVersion>().is_err());
    }

    #[test]
    fn tag_uses_app_prefix() {
        let app = AppName::new("foo").unwrap();
        assert_eq!(ReleaseVersion::new(4).unwrap().tag_for(&app), "foo-v4");
    }
}
