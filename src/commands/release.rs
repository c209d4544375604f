// ABOUTME: Release command implementations.
// ABOUTME: Creates releases from git state and reads release history.

use std::path::Path;

use catapult::config::LedgerConfig;
use catapult::error::{Error, Result};
use catapult::git::GitCli;
use catapult::ledger::{
    CurrentStateResolver, ReleaseDraft, ReleaseLedger, ReleaseOptions, ReleaseRange,
};
use catapult::output::{Output, RecordView};
use catapult::types::ImageId;

use super::connect::{SharedStore, Stores};
use super::{parse_app, parse_version};

/// Arguments of `release new`.
pub struct NewRelease {
    pub app: String,
    pub commit: String,
    pub version: Option<String>,
    pub image: Option<String>,
    pub no_image: bool,
    pub changelog: Option<String>,
    pub no_tag: bool,
    pub rollback: bool,
    pub dry: bool,
}

impl NewRelease {
    /// Exactly one of `--image` and `--no-image` must be given.
    fn image(&self) -> Result<ImageId> {
        match (self.image.as_deref().map(str::trim), self.no_image) {
            (Some(""), _) => Err(Error::InvalidArgument(
                "image must not be empty; pass --no-image for applications without one"
                    .to_string(),
            )),
            (Some(image), false) => Ok(ImageId::new(image)),
            (None, true) => Ok(ImageId::none()),
            _ => Err(Error::InvalidArgument(
                "pass exactly one of --image and --no-image".to_string(),
            )),
        }
    }
}

fn release_ledger(
    config: &LedgerConfig,
    stores: &Stores,
    repo: &Path,
    options: ReleaseOptions,
) -> ReleaseLedger<SharedStore, GitCli> {
    let git = GitCli::new(repo, config.git.remote.clone()).with_timeout(config.git.timeout);
    ReleaseLedger::with_options(stores.releases.clone(), git, options)
}

pub async fn release_new(
    config: &LedgerConfig,
    stores: &Stores,
    repo: &Path,
    args: NewRelease,
    output: &Output,
) -> Result<()> {
    let app = parse_app(&args.app)?;
    let explicit = args.version.as_deref().map(parse_version).transpose()?;
    let image = args.image()?;

    let mut options = config.release_options();
    options.allow_rollback = args.rollback;
    if args.no_tag {
        options.create_tags = false;
    }
    let ledger = release_ledger(config, stores, repo, options);

    let mut draft = ReleaseDraft::new(args.commit, image);
    if let Some(changelog) = args.changelog {
        draft = draft.changelog(changelog);
    }

    if args.dry {
        let pending = ledger.prepare_release(&app, &draft, explicit).await?;
        output.warnings(&pending.diagnostics);
        output.emit(&RecordView::pending(&pending.record, None), RecordView::detail);
        if pending.record.rollback {
            output.success("This release would be a rollback");
        }
        output.success("Dry run: nothing was recorded");
        return Ok(());
    }

    let outcome = ledger.create_release(&app, &draft, explicit).await?;
    output.warnings(&outcome.diagnostics);
    output.release(&outcome.release);

    if let Some(tag) = &outcome.tag {
        output.success(&format!("Tagged {tag}"));
    }
    output.success(&format!("Released {app} v{}", outcome.release.version()));
    Ok(())
}

pub async fn release_current(stores: &Stores, app: &str, output: &Output) -> Result<()> {
    let app = parse_app(app)?;
    let current = CurrentStateResolver::new(stores.releases.as_ref(), None)
        .current_release(&app)
        .await?;
    output.release(&current);
    Ok(())
}

pub async fn release_get(
    stores: &Stores,
    app: &str,
    version: &str,
    output: &Output,
) -> Result<()> {
    let app = parse_app(app)?;
    let version = parse_version(version)?;
    let release = CurrentStateResolver::new(stores.releases.as_ref(), None)
        .release(&app, version)
        .await?;
    output.release(&release);
    Ok(())
}

pub async fn release_ls(
    config: &LedgerConfig,
    stores: &Stores,
    repo: &Path,
    app: &str,
    last: Option<usize>,
    output: &Output,
) -> Result<()> {
    let app = parse_app(app)?;
    let history = release_ledger(config, stores, repo, config.release_options())
        .releases(&app, last)
        .await?;
    output.releases(&history);
    Ok(())
}

pub async fn release_find(
    config: &LedgerConfig,
    stores: &Stores,
    repo: &Path,
    app: &str,
    commit: &str,
    output: &Output,
) -> Result<()> {
    let app = parse_app(app)?;
    let release = release_ledger(config, stores, repo, config.release_options())
        .release_containing(&app, commit)
        .await?;
    output.release(&release);
    Ok(())
}

pub async fn release_log(
    config: &LedgerConfig,
    stores: &Stores,
    repo: &Path,
    app: &str,
    range: &str,
    resolve: bool,
    output: &Output,
) -> Result<()> {
    let app = parse_app(app)?;
    let range: ReleaseRange = range.parse()?;
    let ledger = release_ledger(config, stores, repo, config.release_options());

    if resolve {
        let (start, end) = ledger.resolve_range(&app, &range).await?;
        output.range(&start, &end);
    } else {
        let changelog = ledger.range_changelog(&app, &range).await?;
        output.changelog(&changelog);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(image: Option<&str>, no_image: bool) -> NewRelease {
        NewRelease {
            app: "foo".to_string(),
            commit: "HEAD".to_string(),
            version: None,
            image: image.map(str::to_string),
            no_image,
            changelog: None,
            no_tag: false,
            rollback: false,
            dry: false,
        }
    }

    #[test]
    fn image_choice_is_explicit() {
        assert_eq!(args(Some("sha256:ab"), false).image().unwrap().as_str(), "sha256:ab");
        assert!(args(None, true).image().unwrap().is_empty());
        assert!(args(None, false).image().is_err());
        assert!(args(Some("sha256:ab"), true).image().is_err());
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = args(Some("  "), false).image().unwrap_err();
        assert!(err.to_string().contains("--no-image"));
    }
}
