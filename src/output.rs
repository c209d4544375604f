// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Renders ledger records for humans or as JSON lines for scripting.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::git::Changelog;
use crate::ledger::{DeployRecord, ReleaseRecord, Stored};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Aligned text for terminals
    Human,
    /// JSON for scripting
    Json,
}

impl OutputMode {
    /// Human on a terminal, JSON when stdout is piped.
    pub fn detect() -> Self {
        if std::io::stdout().is_terminal() {
            OutputMode::Human
        } else {
            OutputMode::Json
        }
    }
}

/// Flat view of a stored record, shared by both record kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordView<'a> {
    pub version: u64,
    pub commit: &'a str,
    pub author: &'a str,
    pub image: &'a str,
    pub changelog: &'a str,
    pub timestamp: DateTime<Utc>,
    pub rollback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<&'a str>,
    pub version_id: &'a str,
}

impl<'a> RecordView<'a> {
    pub fn release(stored: &'a Stored<ReleaseRecord>) -> Self {
        Self::build(&stored.record, None, stored.version_id.as_str())
    }

    pub fn deploy(stored: &'a Stored<DeployRecord>) -> Self {
        Self::build(
            &stored.record.release,
            Some(stored.record.environment.as_str()),
            stored.version_id.as_str(),
        )
    }

    /// A record that has not been written yet and so has no version id.
    pub fn pending(record: &'a ReleaseRecord, environment: Option<&'a str>) -> Self {
        Self::build(record, environment, "-")
    }

    fn build(
        record: &'a ReleaseRecord,
        environment: Option<&'a str>,
        version_id: &'a str,
    ) -> Self {
        Self {
            version: record.version.get(),
            commit: record.commit.as_str(),
            author: record.author.as_str(),
            image: record.image.as_str(),
            changelog: record.changelog.as_str(),
            timestamp: record.timestamp,
            rollback: record.rollback,
            environment,
            version_id,
        }
    }

    /// Multi-line rendering for a single record.
    pub fn detail(&self) -> String {
        let mut lines = vec![
            format!("{:<12}v{}", "Version", self.version),
            format!("{:<12}{}", "Commit", self.commit),
            format!("{:<12}{}", "Author", self.author),
            format!("{:<12}{}", "Image", or_dash(self.image)),
            format!("{:<12}{}", "Timestamp", self.timestamp.to_rfc3339()),
            format!("{:<12}{}", "Version id", self.version_id),
        ];
        if let Some(environment) = self.environment {
            lines.push(format!("{:<12}{}", "Environment", environment));
        }
        if self.rollback {
            lines.push(format!("{:<12}yes", "Rollback"));
        }
        lines.push(String::new());
        lines.push(self.changelog.to_string());
        lines.join("\n")
    }

    /// One-line rendering for history listings.
    pub fn summary(&self) -> String {
        let short = &self.commit[..self.commit.len().min(7)];
        format!(
            "v{:<6}{}  {}  {}{}",
            self.version,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            short,
            self.author,
            if self.rollback { "  (rollback)" } else { "" }
        )
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a value: `human` renders it in human mode, JSON otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T) -> String) {
        match self.mode {
            OutputMode::Human => println!("{}", human(value)),
            OutputMode::Json => match serde_json::to_string(value) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::error!(error = %err, "failed to encode output"),
            },
        }
    }

    pub fn release(&self, stored: &Stored<ReleaseRecord>) {
        self.emit(&RecordView::release(stored), RecordView::detail);
    }

    pub fn deploy(&self, stored: &Stored<DeployRecord>) {
        self.emit(&RecordView::deploy(stored), RecordView::detail);
    }

    pub fn releases(&self, history: &[Stored<ReleaseRecord>]) {
        let views: Vec<_> = history.iter().map(RecordView::release).collect();
        self.emit(&views, |views| render_summaries(views));
    }

    pub fn deploys(&self, history: &[Stored<DeployRecord>]) {
        let views: Vec<_> = history.iter().map(RecordView::deploy).collect();
        self.emit(&views, |views| render_summaries(views));
    }

    /// A resolved range, printed as `start...end` for use with `git log`.
    pub fn range(&self, start: &str, end: &str) {
        let view = RangeView { start, end };
        self.emit(&view, |view| format!("{}...{}", view.start, view.end));
    }

    pub fn changelog(&self, changelog: &Changelog) {
        let view = ChangelogView {
            changelog: &changelog.text,
            rollback: changelog.rollback,
        };
        self.emit(&view, |view| view.changelog.trim_end().to_string());
    }

    /// Print a success message (suppressed in JSON mode, where the record
    /// itself is the result).
    pub fn success(&self, message: &str) {
        if self.mode == OutputMode::Human {
            println!("{message}");
        }
    }

    /// Echo collected warnings to stderr.
    pub fn warnings(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            match self.mode {
                OutputMode::Human => eprintln!("Warning: {}", warning.message),
                OutputMode::Json => {
                    let event = JsonEvent {
                        event: "warning",
                        message: &warning.message,
                    };
                    if let Ok(json) = serde_json::to_string(&event) {
                        eprintln!("{json}");
                    }
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn render_summaries(views: &[RecordView<'_>]) -> String {
    if views.is_empty() {
        return "(no entries)".to_string();
    }
    views
        .iter()
        .map(RecordView::summary)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct RangeView<'a> {
    start: &'a str,
    end: &'a str,
}

#[derive(Serialize)]
struct ChangelogView<'a> {
    changelog: &'a str,
    rollback: bool,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommitHash, ImageId, ObjectVersionId, ReleaseVersion};
    use chrono::TimeZone;

    fn stored() -> Stored<ReleaseRecord> {
        Stored {
            record: ReleaseRecord {
                version: ReleaseVersion::new(3).unwrap(),
                author: "dev@example.com".to_string(),
                commit: CommitHash::new(&"a".repeat(40)).unwrap(),
                image: ImageId::none(),
                changelog: "fix things".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                rollback: false,
            },
            version_id: ObjectVersionId::new("v-3"),
            etag: None,
            last_modified: None,
        }
    }

    #[test]
    fn detail_shows_dash_for_missing_image() {
        let stored = stored();
        let detail = RecordView::release(&stored).detail();
        assert!(detail.contains("Version     v3"));
        assert!(detail.contains("Image       -"));
        assert!(detail.ends_with("fix things"));
        assert!(!detail.contains("Environment"));
    }

    #[test]
    fn summary_is_one_line_with_short_commit() {
        let stored = stored();
        let summary = RecordView::release(&stored).summary();
        assert!(summary.starts_with("v3"));
        assert!(summary.contains(" aaaaaaa "));
        assert!(!summary.contains('\n'));
    }

    #[test]
    fn json_view_omits_environment_for_releases() {
        let stored = stored();
        let json = serde_json::to_value(RecordView::release(&stored)).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["version_id"], "v-3");
        assert!(json.get("environment").is_none());
    }
}
