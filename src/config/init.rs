// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a catapult.yml template naming the ledger buckets.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

pub fn init_config(
    dir: &Path,
    release_bucket: Option<&str>,
    deploy_bucket: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(
        release_bucket.unwrap_or("my-releases"),
        deploy_bucket.unwrap_or("my-deploys"),
    );
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(release_bucket: &str, deploy_bucket: &str) -> String {
    format!(
        r#"release_bucket: {release_bucket}
deploy_bucket: {deploy_bucket}
environments:
  - staging
  - production
# aws_profile: default
# mfa_device:
#   env: AWS_MFA_DEVICE
# concurrency: optimistic  # or accept-race
# max_write_attempts: 5
# retry:
#   max_attempts: 3
#   timeout: 30s
git:
  remote: origin
  tag: true
  # timeout: 60s
"#
    )
}
