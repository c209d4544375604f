// ABOUTME: Commit ranges whose ends may name releases instead of git refs.
// ABOUTME: Parses `<start>..<end>` where either side is `v<N>` or any git ref.

use std::fmt;
use std::str::FromStr;

use super::LedgerError;
use crate::types::ReleaseVersion;

/// One side of a [`ReleaseRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeEnd {
    /// The commit recorded by this release.
    Release(ReleaseVersion),
    /// Passed to git unchanged.
    Ref(String),
}

impl RangeEnd {
    fn parse(side: &str) -> Self {
        let version = side
            .strip_prefix('v')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|_| side.parse::<ReleaseVersion>().ok());
        match version {
            Some(version) => RangeEnd::Release(version),
            None => RangeEnd::Ref(side.to_string()),
        }
    }
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Release(version) => write!(f, "v{version}"),
            RangeEnd::Ref(name) => f.write_str(name),
        }
    }
}

/// `start..end`, as accepted by `release log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRange {
    pub start: RangeEnd,
    pub end: RangeEnd,
}

impl FromStr for ReleaseRange {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once("..")
            .ok_or_else(|| LedgerError::InvalidRange(s.to_string()))?;
        // `a...b` would leave a stray dot on the right.
        if start.is_empty() || end.is_empty() || end.starts_with('.') {
            return Err(LedgerError::InvalidRange(s.to_string()));
        }
        Ok(Self {
            start: RangeEnd::parse(start),
            end: RangeEnd::parse(end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u64) -> ReleaseVersion {
        ReleaseVersion::new(n).unwrap()
    }

    #[test]
    fn release_ends_are_recognized() {
        let range: ReleaseRange = "v3..v7".parse().unwrap();
        assert_eq!(range.start, RangeEnd::Release(v(3)));
        assert_eq!(range.end, RangeEnd::Release(v(7)));
    }

    #[test]
    fn other_ends_are_git_refs() {
        let range: ReleaseRange = "v2..HEAD".parse().unwrap();
        assert_eq!(range.start, RangeEnd::Release(v(2)));
        assert_eq!(range.end, RangeEnd::Ref("HEAD".to_string()));

        let range: ReleaseRange = "v1.2.0..vnext".parse().unwrap();
        assert_eq!(range.start, RangeEnd::Ref("v1.2.0".to_string()));
        assert_eq!(range.end, RangeEnd::Ref("vnext".to_string()));
    }

    #[test]
    fn v0_is_a_ref() {
        let range: ReleaseRange = "v0..main".parse().unwrap();
        assert_eq!(range.start, RangeEnd::Ref("v0".to_string()));
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        for bad in ["v3", "..v3", "v3..", "a...b", ""] {
            let err = bad.parse::<ReleaseRange>().unwrap_err();
            assert!(matches!(err, LedgerError::InvalidRange(_)), "{bad}");
        }
    }
}
