// ABOUTME: Deploy command implementations.
// ABOUTME: Records deploys into environments and reads deploy history.

use catapult::config::LedgerConfig;
use catapult::error::{Error, Result};
use catapult::ledger::{CurrentStateResolver, DeployLedger};
use catapult::output::{Output, RecordView};

use super::connect::Stores;
use super::{parse_app, parse_environment, parse_version};

/// Arguments of `deploy start`.
pub struct DeployStart {
    pub app: String,
    pub env: String,
    pub version: Option<String>,
    pub rollback: bool,
    pub dry: bool,
}

pub async fn deploy_start(
    config: &LedgerConfig,
    stores: &Stores,
    args: DeployStart,
    output: &Output,
) -> Result<()> {
    let app = parse_app(&args.app)?;
    let environment = parse_environment(&args.env)?;
    let target = args.version.as_deref().map(parse_version).transpose()?;
    let deploys = stores.deploys()?;

    if !config.environments.is_empty() && !config.environments.contains(&environment) {
        tracing::warn!(%environment, "environment is not listed in the configuration");
    }

    let ledger = DeployLedger::new(stores.releases.clone(), deploys)
        .with_max_write_attempts(config.max_write_attempts);
    let pending = ledger.prepare_deploy(&app, &environment, target).await?;

    if args.dry {
        output.emit(
            &RecordView::pending(&pending.record.release, Some(environment.as_str())),
            RecordView::detail,
        );
        if pending.is_rollback() {
            output.success("This deploy would be a rollback");
        }
        output.success("Dry run: nothing was recorded");
        return Ok(());
    }

    if let Some(previous) = pending.previous.as_ref().filter(|_| pending.is_rollback()) {
        if !args.rollback {
            return Err(Error::RollbackNotConfirmed {
                environment,
                current: previous.version(),
                target: pending.record.release.version,
            });
        }
        tracing::warn!(
            %app,
            %environment,
            from = %previous.version(),
            to = %pending.record.release.version,
            "rolling back"
        );
    }

    let stored = ledger.commit_deploy(pending).await?;
    output.deploy(&stored);
    output.success(&format!(
        "Started deployment of {app} v{} to {environment}",
        stored.version()
    ));
    Ok(())
}

pub async fn deploy_current(stores: &Stores, app: &str, env: &str, output: &Output) -> Result<()> {
    let app = parse_app(app)?;
    let environment = parse_environment(env)?;
    let deploys = stores.deploys()?;
    let current = CurrentStateResolver::new(stores.releases.as_ref(), Some(deploys.as_ref()))
        .current_deploy(&app, &environment)
        .await?;
    output.deploy(&current);
    Ok(())
}

pub async fn deploy_ls(
    stores: &Stores,
    app: &str,
    env: &str,
    last: Option<usize>,
    output: &Output,
) -> Result<()> {
    let app = parse_app(app)?;
    let environment = parse_environment(env)?;
    let history = DeployLedger::new(stores.releases.clone(), stores.deploys()?)
        .deploys(&app, &environment, last)
        .await?;
    output.deploys(&history);
    Ok(())
}
