// ABOUTME: Pipeline resource commands speaking JSON over stdin and stdout.
// ABOUTME: Wires check, in, and out requests to the resource adapter.

use std::io::Write;
use std::path::{Path, PathBuf};

use catapult::aws;
use catapult::error::Result;
use catapult::git::GitCli;
use catapult::resource::{
    CheckRequest, FetchRequest, PublishRequest, Resource, ResourceVersion, Source,
};
use catapult::store::RetryPolicy;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::connect::{self, SharedStore};

/// Remote that release tags created by the resource are pushed to.
const TAG_REMOTE: &str = "origin";

fn read_request<T: DeserializeOwned>() -> Result<T> {
    Ok(serde_json::from_reader(std::io::stdin().lock())?)
}

fn write_response<T: Serialize>(response: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    Ok(())
}

async fn open_resource(source: &Source, repo: &Path) -> Result<Resource<SharedStore, GitCli>> {
    source.validate()?;
    let sdk = connect::sdk_config(source.aws_profile.as_deref(), None).await?;
    let client = aws::s3_client(&sdk, source.endpoint.as_deref());
    let retry = RetryPolicy::default();

    let releases = connect::open(&client, &source.bucket, &retry);
    let deploys = source
        .deploys_bucket
        .as_deref()
        .map(|bucket| connect::open(&client, bucket, &retry));

    let git = GitCli::new(repo, Some(TAG_REMOTE.to_string()));
    Ok(Resource::new(source.clone(), releases, deploys, git)?)
}

pub async fn resource_check() -> Result<()> {
    let request: CheckRequest = read_request()?;
    let resource = open_resource(&request.source, Path::new(".")).await?;

    let versions: Vec<ResourceVersion> = resource
        .check(request.version.as_ref())
        .await?
        .map(Vec::from)
        .unwrap_or_default();
    write_response(&versions)
}

pub async fn resource_in(dir: &Path) -> Result<()> {
    let request: FetchRequest = read_request()?;
    let resource = open_resource(&request.source, dir).await?;
    let output = resource.fetch(&request.version, dir).await?;
    write_response(&output)
}

pub async fn resource_out(dir: &Path) -> Result<()> {
    let request: PublishRequest = read_request()?;
    let repo = request
        .params
        .repository
        .as_ref()
        .map(|relative| dir.join(relative))
        .unwrap_or_else(|| PathBuf::from(dir));
    let resource = open_resource(&request.source, &repo).await?;
    let output = resource.publish(&request.params, dir).await?;
    write_response(&output)
}
