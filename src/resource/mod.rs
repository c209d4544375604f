// ABOUTME: Polling resource adapter exposing the ledger to a delivery pipeline.
// ABOUTME: Implements check, fetch, and publish over release or deploy history.

mod error;
mod files;

pub use error::{ResourceError, ResourceErrorKind};
pub use files::{METADATA_FILE, MetadataField};

use std::path::{Path, PathBuf};

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use crate::git::GitAdapter;
use crate::ledger::{
    CurrentStateResolver, DeployIdentity, DeployLedger, LedgerError, ReleaseDraft,
    ReleaseIdentity, ReleaseLedger, ReleaseOptions,
};
use crate::store::ObjectLedgerStore;
use crate::types::{AppName, EnvironmentName, ImageId, ObjectVersionId, ReleaseVersion};
use error::{InvalidEnvironmentSnafu, InvalidVersionSnafu, MissingParameterSnafu, ReadFileSnafu};

/// Where the resource reads from. Setting `environment` switches the
/// resource from release history to that environment's deploy history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub app_name: AppName,
    pub bucket: String,
    #[serde(default)]
    pub deploys_bucket: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub aws_profile: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Source {
    /// Check the source on its own, before any store is opened.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.environment_name()?.is_some() && self.deploys_bucket.is_none() {
            return MissingParameterSnafu {
                name: "deploys_bucket",
            }
            .fail();
        }
        Ok(())
    }

    fn environment_name(&self) -> Result<Option<EnvironmentName>, ResourceError> {
        self.environment
            .as_deref()
            .map(parse_environment)
            .transpose()
    }
}

fn parse_environment(value: &str) -> Result<EnvironmentName, ResourceError> {
    EnvironmentName::new(value)
        .map_err(LedgerError::from)
        .context(InvalidEnvironmentSnafu)
}

/// Identity emitted to the pipeline. Releases carry only `version`; deploys
/// add the object version id of the deploy record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<String>,
}

impl ResourceVersion {
    fn release_version(&self) -> Result<ReleaseVersion, ResourceError> {
        self.version.parse::<ReleaseVersion>().ok().context(InvalidVersionSnafu {
            field: "version",
            value: self.version.as_str(),
        })
    }

    /// `None` when the version carries no deploy id.
    fn deploy_identity(&self) -> Result<Option<DeployIdentity>, ResourceError> {
        let Some(deploy) = &self.deploy else {
            return Ok(None);
        };
        if deploy.is_empty() {
            return InvalidVersionSnafu {
                field: "deploy",
                value: deploy.as_str(),
            }
            .fail();
        }
        Ok(Some(DeployIdentity {
            version: self.release_version()?,
            version_id: ObjectVersionId::new(deploy.as_str()),
        }))
    }
}

impl From<ReleaseIdentity> for ResourceVersion {
    fn from(identity: ReleaseIdentity) -> Self {
        Self {
            version: identity.version.to_string(),
            deploy: None,
        }
    }
}

impl From<DeployIdentity> for ResourceVersion {
    fn from(identity: DeployIdentity) -> Self {
        Self {
            version: identity.version.to_string(),
            deploy: Some(identity.version_id.into_inner()),
        }
    }
}

/// Parameters accepted by `publish`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublishParams {
    /// Record a deploy instead of a release.
    #[serde(default)]
    pub is_deploy: bool,
    /// Explicit version: the release to deploy, or the number to release as.
    #[serde(default)]
    pub version: Option<String>,
    /// Overrides the source environment for deploys.
    #[serde(default)]
    pub environment: Option<String>,
    /// Commit reference to release. Defaults to `HEAD`.
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// File holding the image id, relative to the build directory.
    #[serde(default)]
    pub image_file: Option<PathBuf>,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Repository to release from, relative to the build directory.
    #[serde(default)]
    pub repository: Option<PathBuf>,
}

/// Result of fetch and publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutput {
    pub version: ResourceVersion,
    pub metadata: Vec<MetadataField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<ResourceVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub source: Source,
    pub version: ResourceVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub source: Source,
    #[serde(default)]
    pub params: PublishParams,
}

#[derive(Debug, Clone)]
enum Target {
    Releases,
    Deploys(EnvironmentName),
}

/// The check/fetch/publish cycle over one application's ledger.
pub struct Resource<S, G> {
    source: Source,
    target: Target,
    releases: S,
    deploys: Option<S>,
    git: G,
    options: ReleaseOptions,
}

impl<S, G> Resource<S, G>
where
    S: ObjectLedgerStore + Clone,
    G: GitAdapter + Clone,
{
    /// Validates the source. A source with an environment but no deploy
    /// store is rejected here, before any storage call.
    pub fn new(
        source: Source,
        releases: S,
        deploys: Option<S>,
        git: G,
    ) -> Result<Self, ResourceError> {
        let target = match source.environment_name()? {
            Some(environment) => {
                if deploys.is_none() {
                    return MissingParameterSnafu {
                        name: "deploys_bucket",
                    }
                    .fail();
                }
                Target::Deploys(environment)
            }
            None => Target::Releases,
        };

        Ok(Self {
            source,
            target,
            releases,
            deploys,
            git,
            options: ReleaseOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ReleaseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn app(&self) -> &AppName {
        &self.source.app_name
    }

    fn resolver(&self) -> CurrentStateResolver<'_, S> {
        CurrentStateResolver::new(&self.releases, self.deploys.as_ref())
    }

    /// Identities newer than `previous`, oldest first. When nothing is newer
    /// the current identity is returned alone. `None` means the ledger holds
    /// nothing yet.
    pub async fn check(
        &self,
        previous: Option<&ResourceVersion>,
    ) -> Result<Option<NonEmpty<ResourceVersion>>, ResourceError> {
        let (newer, current) = match &self.target {
            Target::Releases => self.check_releases(previous).await?,
            Target::Deploys(environment) => self.check_deploys(environment, previous).await?,
        };

        tracing::debug!(app = %self.app(), newer = newer.len(), "check complete");
        Ok(NonEmpty::from_vec(newer).or_else(|| current.map(NonEmpty::new)))
    }

    async fn check_releases(
        &self,
        previous: Option<&ResourceVersion>,
    ) -> Result<(Vec<ResourceVersion>, Option<ResourceVersion>), ResourceError> {
        let app = self.app();
        let resolver = self.resolver();
        let since = previous.map(ResourceVersion::release_version).transpose()?;

        let Some(current) = absent_as_none(resolver.current_release(app).await)? else {
            return Ok((Vec::new(), None));
        };
        let newer = match since {
            Some(version) => resolver
                .releases_since(app, &ReleaseIdentity { version })
                .await?
                .into_iter()
                .map(|stored| stored.identity().into())
                .collect(),
            None => Vec::new(),
        };
        Ok((newer, Some(current.identity().into())))
    }

    async fn check_deploys(
        &self,
        environment: &EnvironmentName,
        previous: Option<&ResourceVersion>,
    ) -> Result<(Vec<ResourceVersion>, Option<ResourceVersion>), ResourceError> {
        let app = self.app();
        let resolver = self.resolver();
        let since = match previous {
            Some(prev) => prev.deploy_identity()?,
            None => None,
        };

        let Some(current) = absent_as_none(resolver.current_deploy(app, environment).await)?
        else {
            return Ok((Vec::new(), None));
        };
        let newer = match since {
            Some(identity) => resolver
                .deploys_since(app, environment, &identity)
                .await?
                .into_iter()
                .map(|stored| stored.identity().into())
                .collect(),
            None => Vec::new(),
        };
        Ok((newer, Some(current.identity().into())))
    }

    /// Materialize the record behind `version` into `dest`.
    pub async fn fetch(
        &self,
        version: &ResourceVersion,
        dest: &Path,
    ) -> Result<ResourceOutput, ResourceError> {
        let app = self.app();
        let resolver = self.resolver();

        let (identity, fields) = match &self.target {
            Target::Releases => {
                let stored = resolver.release(app, version.release_version()?).await?;
                (stored.identity().into(), files::release_fields(app, &stored))
            }
            Target::Deploys(environment) => {
                let wanted = version
                    .deploy_identity()?
                    .context(MissingParameterSnafu { name: "deploy" })?;
                let stored = resolver
                    .deploy(app, environment, &wanted.version_id)
                    .await?;
                if stored.version() != wanted.version {
                    return InvalidVersionSnafu {
                        field: "version",
                        value: version.version.as_str(),
                    }
                    .fail();
                }
                (stored.identity().into(), files::deploy_fields(app, &stored))
            }
        };

        files::write_fields(dest, &fields)?;
        tracing::info!(app = %app, dest = %dest.display(), "fetched ledger entry");

        Ok(ResourceOutput {
            version: identity,
            metadata: fields,
        })
    }

    /// Record a release, or a deploy when `params.is_deploy` is set.
    /// Relative paths in `params` are resolved against `base`.
    pub async fn publish(
        &self,
        params: &PublishParams,
        base: &Path,
    ) -> Result<ResourceOutput, ResourceError> {
        let app = self.app();
        let explicit = params
            .version
            .as_deref()
            .map(|value| {
                value.parse::<ReleaseVersion>().ok().context(InvalidVersionSnafu {
                    field: "version",
                    value,
                })
            })
            .transpose()?;

        if params.is_deploy {
            let environment = match (&params.environment, &self.target) {
                (Some(name), _) => parse_environment(name)?,
                (None, Target::Deploys(environment)) => environment.clone(),
                (None, Target::Releases) => {
                    return Err(ResourceError::InvalidEnvironment {
                        source: LedgerError::EnvironmentRequired,
                    });
                }
            };
            let deploys = self.deploys.clone().context(MissingParameterSnafu {
                name: "deploys_bucket",
            })?;

            let stored = DeployLedger::new(self.releases.clone(), deploys)
                .with_max_write_attempts(self.options.max_write_attempts)
                .create_deploy(app, &environment, explicit)
                .await?;
            return Ok(ResourceOutput {
                version: stored.identity().into(),
                metadata: files::deploy_fields(app, &stored),
            });
        }

        let draft = self.draft(params, base)?;
        let outcome = ReleaseLedger::with_options(
            self.releases.clone(),
            self.git.clone(),
            self.options.clone(),
        )
        .create_release(app, &draft, explicit)
        .await?;

        Ok(ResourceOutput {
            version: outcome.release.identity().into(),
            metadata: files::release_fields(app, &outcome.release),
        })
    }

    fn draft(&self, params: &PublishParams, base: &Path) -> Result<ReleaseDraft, ResourceError> {
        let image = match (&params.image, &params.image_file) {
            (Some(image), _) => ImageId::new(image.trim()),
            (None, Some(file)) => {
                let path = base.join(file);
                let content =
                    std::fs::read_to_string(&path).context(ReadFileSnafu { path: &path })?;
                ImageId::new(content.trim())
            }
            (None, None) => ImageId::none(),
        };

        let mut draft = ReleaseDraft::new(params.commit.as_deref().unwrap_or("HEAD"), image);
        if let Some(changelog) = &params.changelog {
            draft = draft.changelog(changelog.as_str());
        }
        if let Some(author) = &params.author {
            draft = draft.author(author.as_str());
        }
        Ok(draft)
    }
}

/// Treat an empty ledger as "nothing yet" rather than an error.
fn absent_as_none<T>(result: Result<T, LedgerError>) -> Result<Option<T>, LedgerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(LedgerError::NoReleases(_) | LedgerError::NoDeploys { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}
