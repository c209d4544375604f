// ABOUTME: Full-length source control commit hashes.
// ABOUTME: Short or symbolic refs must be resolved through git before use.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitHashError {
    #[error("commit hash must be 40 or 64 hex characters, got {0}")]
    BadLength(usize),

    #[error("commit hash contains non-hex character '{0}'")]
    NotHex(char),
}

/// A full SHA-1 (40 hex) or SHA-256 (64 hex) commit id, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(value: &str) -> Result<Self, CommitHashError> {
        let value = value.trim();
        if value.len() != 40 && value.len() != 64 {
            return Err(CommitHashError::BadLength(value.len()));
        }
        if let Some(c) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CommitHashError::NotHex(c));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Whether `reference` already looks like a full hash and needs no lookup.
    pub fn is_full(reference: &str) -> bool {
        Self::new(reference).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(7)]
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

// Ledger entries written by older tooling may hold abbreviated hashes, so the
// wire format is read leniently and only new writes are validated.
impl<'de> Deserialize<'de> for CommitHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(CommitHash::new(&value).unwrap_or(CommitHash(value)))
    }
}
