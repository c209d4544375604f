// ABOUTME: Projects command implementation.
// ABOUTME: Summarizes every released application and its current deploys.

use catapult::config::LedgerConfig;
use catapult::error::Result;
use catapult::ledger::{CurrentStateResolver, LedgerError, LedgerErrorKind, ReleaseRecord};
use catapult::output::Output;
use catapult::types::AppName;
use serde::Serialize;

use super::connect::Stores;

/// Shown when credentials cannot read an environment's deploys.
const ACCESS_DENIED: &str = "???";
/// Shown when an environment has never been deployed.
const NEVER_DEPLOYED: &str = "-";

#[derive(Debug, Serialize)]
struct ProjectRow {
    name: String,
    latest_release: String,
    environments: Vec<EnvironmentCell>,
}

#[derive(Debug, Serialize)]
struct EnvironmentCell {
    environment: String,
    #[serde(skip)]
    label: String,
    deploy: String,
}

fn describe(record: &ReleaseRecord) -> String {
    format!(
        "v{} {} ({})",
        record.version,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.commit.short()
    )
}

pub async fn projects(config: &LedgerConfig, stores: &Stores, output: &Output) -> Result<()> {
    let resolver = CurrentStateResolver::new(stores.releases.as_ref(), stores.deploys.as_deref());

    let apps: Vec<AppName> = stores
        .releases
        .list_keys()
        .await
        .map_err(LedgerError::from)?
        .into_iter()
        .filter(|key| !key.contains('/'))
        .filter_map(|key| AppName::new(&key).ok())
        .collect();

    let mut rows = Vec::with_capacity(apps.len());
    for app in apps {
        let latest = match resolver.current_release(&app).await {
            Ok(latest) => latest,
            Err(err) if err.kind() == LedgerErrorKind::NotFound => {
                tracing::debug!(%app, "skipping key without valid releases");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let mut environments = Vec::with_capacity(config.environments.len());
        if stores.deploys.is_some() {
            for environment in &config.environments {
                let deploy = match resolver.current_deploy(&app, environment).await {
                    Ok(current) => describe(&current.record.release),
                    Err(err) if err.kind() == LedgerErrorKind::AccessDenied => {
                        tracing::warn!(
                            %app,
                            %environment,
                            error = %err,
                            "access denied reading deploys"
                        );
                        ACCESS_DENIED.to_string()
                    }
                    Err(err) if err.kind() == LedgerErrorKind::NotFound => {
                        NEVER_DEPLOYED.to_string()
                    }
                    Err(err) => return Err(err.into()),
                };
                environments.push(EnvironmentCell {
                    environment: environment.to_string(),
                    label: environment.title(),
                    deploy,
                });
            }
        }

        rows.push(ProjectRow {
            name: app.to_string(),
            latest_release: describe(&latest.record),
            environments,
        });
    }

    output.emit(&rows, |rows| render(rows));
    Ok(())
}

fn render(rows: &[ProjectRow]) -> String {
    if rows.is_empty() {
        return "(no projects)".to_string();
    }

    let mut lines = Vec::new();
    for row in rows {
        lines.push(row.name.clone());
        lines.push(format!("  {:<16}{}", "Latest release", row.latest_release));
        for cell in &row.environments {
            lines.push(format!("  {:<16}{}", cell.label, cell.deploy));
        }
    }
    lines.join("\n")
}
