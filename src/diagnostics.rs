// ABOUTME: Diagnostics accumulator for non-fatal warnings during ledger writes.
// ABOUTME: Collects warnings that shouldn't fail a release but should be shown to users.

/// Collects non-fatal warnings during ledger operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a ledger operation.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// The release tag already exists in the repository.
    pub fn tag_conflict(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TagConflict,
            message: message.into(),
        }
    }

    /// Tag creation or push failed for another reason.
    pub fn tag_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TagFailed,
            message: message.into(),
        }
    }

    /// The changelog could not be computed from git history.
    pub fn changelog_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ChangelogUnavailable,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during ledger writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Tag `<app>-v<version>` already existed; the release was still written.
    TagConflict,
    /// Tag could not be created or pushed; the release was still written.
    TagFailed,
    /// Git history between releases could not be walked.
    ChangelogUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::tag_conflict("tag foo-v1 already exists"));
        diag.warn(Warning::tag_failed("push rejected"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(Warning::tag_conflict("t").kind, WarningKind::TagConflict);
        assert_eq!(Warning::tag_failed("t").kind, WarningKind::TagFailed);
        assert_eq!(
            Warning::changelog_unavailable("t").kind,
            WarningKind::ChangelogUnavailable
        );
    }
}
