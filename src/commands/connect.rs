// ABOUTME: Builds the ledger stores for a CLI invocation.
// ABOUTME: Loads AWS credentials, prompts for MFA codes, and wraps stores with retries.

use std::io::Write;
use std::sync::Arc;

use aws_config::SdkConfig;
use catapult::aws::{self, SessionCache};
use catapult::config::LedgerConfig;
use catapult::error::{Error, Result};
use catapult::store::{ObjectLedgerStore, RetryPolicy, Retrying, S3Store};

pub type SharedStore = Arc<dyn ObjectLedgerStore>;

/// Release store plus the deploy store, when one is configured.
pub struct Stores {
    pub releases: SharedStore,
    pub deploys: Option<SharedStore>,
}

impl Stores {
    pub fn deploys(&self) -> Result<SharedStore> {
        self.deploys
            .clone()
            .ok_or(Error::MissingRequiredParameter("deploy_bucket"))
    }
}

/// Resolve credentials for `profile`, going through MFA when a device is set.
pub async fn sdk_config(profile: Option<&str>, mfa_device: Option<&str>) -> Result<SdkConfig> {
    match mfa_device {
        None => Ok(aws::sdk_config(profile).await),
        Some(device) => {
            let cache = SessionCache::default_location();
            aws::mfa_sdk_config(profile, device, cache.as_ref(), || prompt_mfa_code(device)).await
        }
    }
}

fn prompt_mfa_code(device: &str) -> Result<String> {
    eprint!("MFA code for {device}: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let code = line.trim();
    if code.is_empty() {
        return Err(Error::Session("no MFA code entered".to_string()));
    }
    Ok(code.to_string())
}

/// Open S3-backed stores for the configured buckets.
pub async fn connect(config: &LedgerConfig) -> Result<Stores> {
    let sdk = sdk_config(config.aws_profile.as_deref(), config.mfa_device.as_deref()).await?;
    let client = aws::s3_client(&sdk, config.endpoint.as_deref());

    tracing::debug!(
        release_bucket = %config.release_bucket,
        deploy_bucket = ?config.deploy_bucket,
        "connecting to object store"
    );

    Ok(Stores {
        releases: open(&client, &config.release_bucket, &config.retry),
        deploys: config
            .deploy_bucket
            .as_deref()
            .map(|bucket| open(&client, bucket, &config.retry)),
    })
}

pub fn open(client: &aws_sdk_s3::Client, bucket: &str, retry: &RetryPolicy) -> SharedStore {
    Arc::new(Retrying::new(
        S3Store::new(client.clone(), bucket),
        retry.clone(),
    ))
}
