// ABOUTME: Flattens ledger records into named fields for pipeline consumption.
// ABOUTME: Writes one file per field plus a metadata.json summary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use snafu::ResultExt;

use super::error::{EncodeSnafu, WriteFileSnafu};
use super::ResourceError;
use crate::ledger::{DeployRecord, ReleaseRecord, Stored};
use crate::types::AppName;

pub const METADATA_FILE: &str = "metadata.json";

/// A `(name, value)` pair reported to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

impl MetadataField {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

fn record_fields(app: &AppName, release: &ReleaseRecord, version_id: &str) -> Vec<MetadataField> {
    vec![
        MetadataField::new("version", release.version.to_string()),
        MetadataField::new("commit", release.commit.as_str()),
        MetadataField::new("author", release.author.as_str()),
        MetadataField::new("image", release.image.as_str()),
        MetadataField::new("version_id", version_id),
        MetadataField::new("changelog", release.changelog.as_str()),
        MetadataField::new("tag", release.version.tag_for(app)),
        MetadataField::new("timestamp", release.timestamp.to_rfc3339()),
    ]
}

pub fn release_fields(app: &AppName, stored: &Stored<ReleaseRecord>) -> Vec<MetadataField> {
    record_fields(app, &stored.record, stored.version_id.as_str())
}

pub fn deploy_fields(app: &AppName, stored: &Stored<DeployRecord>) -> Vec<MetadataField> {
    let mut fields = record_fields(app, &stored.record.release, stored.version_id.as_str());
    fields.push(MetadataField::new(
        "environment",
        stored.record.environment.as_str(),
    ));
    fields
}

/// Write each field to `dest/<name>` and all of them to `metadata.json`.
pub fn write_fields(dest: &Path, fields: &[MetadataField]) -> Result<(), ResourceError> {
    std::fs::create_dir_all(dest).context(WriteFileSnafu { path: dest })?;

    for field in fields {
        let path = dest.join(&field.name);
        std::fs::write(&path, &field.value).context(WriteFileSnafu { path: &path })?;
    }

    let summary: BTreeMap<&str, &str> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.value.as_str()))
        .collect();
    let json = serde_json::to_string_pretty(&summary).context(EncodeSnafu)?;
    let path = dest.join(METADATA_FILE);
    std::fs::write(&path, json).context(WriteFileSnafu { path: &path })?;

    Ok(())
}
