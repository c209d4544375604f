// ABOUTME: Config string values that may be read from the environment.
// ABOUTME: A value is either a literal or an `{env: VAR, default: ...}` reference.

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against the process environment. Called once while loading.
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

/// Resolve an optional value, treating an empty result as unset.
pub fn resolve_optional(value: Option<&EnvValue>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => v.resolve().map(|s| Some(s).filter(|s| !s.is_empty())),
    }
}
