// ABOUTME: GitAdapter backed by the local `git` executable.
// ABOUTME: Spawns git as a child process inside the configured repository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{Changelog, GitAdapter, GitError};
use crate::types::CommitHash;

/// Default ceiling for a single git invocation. Pushing a tag is the slowest.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs git commands in a working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    remote: Option<String>,
    timeout: Duration,
}

impl GitCli {
    /// Use the repository containing `repo`. Tags are pushed to `remote` when set.
    pub fn new(repo: impl Into<PathBuf>, remote: Option<String>) -> Self {
        Self {
            repo: repo.into(),
            remote,
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Kill any git invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    async fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        tracing::debug!("git {}", args.join(" "));

        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(GitError::Timeout {
                command: args.first().copied().unwrap_or_default().to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn run_ok(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(failed(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn failed(args: &[&str], output: &Output) -> GitError {
    GitError::CommandFailed {
        command: args.first().copied().unwrap_or_default().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl GitAdapter for GitCli {
    async fn resolve(&self, reference: &str) -> Result<CommitHash, GitError> {
        let spec = format!("{reference}^{{commit}}");
        let output = self.run(&["rev-parse", "--verify", "--quiet", &spec]).await?;
        if !output.status.success() {
            return Err(GitError::UnknownRef(reference.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        CommitHash::new(stdout.trim()).map_err(|_| GitError::UnknownRef(reference.to_string()))
    }

    async fn create_tag(&self, name: &str, commit: &CommitHash) -> Result<(), GitError> {
        let output = self
            .run(&["tag", "--annotate", name, commit.as_str(), "--message", name])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists") {
                return Err(GitError::TagAlreadyExists(name.to_string()));
            }
            return Err(failed(&["tag"], &output));
        }

        if let Some(remote) = &self.remote {
            let refspec = format!("refs/tags/{name}");
            let push = self.run(&["push", remote, &refspec]).await?;
            if !push.status.success() {
                return Err(GitError::PushRejected {
                    tag: name.to_string(),
                    reason: String::from_utf8_lossy(&push.stderr).trim().to_string(),
                });
            }
        }

        Ok(())
    }

    async fn is_ancestor(
        &self,
        ancestor: &CommitHash,
        descendant: &CommitHash,
    ) -> Result<bool, GitError> {
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ];
        let output = self.run(&args).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(failed(&args, &output)),
        }
    }

    async fn author(&self) -> Result<Option<String>, GitError> {
        let output = self.run(&["config", "--get", "user.email"]).await?;
        // Exit code 1 means the key is unset.
        if output.status.code() == Some(1) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(failed(&["config"], &output));
        }

        let email = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!email.is_empty()).then_some(email))
    }

    async fn changelog(
        &self,
        from: Option<&CommitHash>,
        to: &CommitHash,
    ) -> Result<Changelog, GitError> {
        let Some(from) = from else {
            let text = self.run_ok(&["log", "--format=medium", to.as_str()]).await?;
            return Ok(Changelog {
                text,
                rollback: false,
            });
        };

        if from == to {
            return Ok(Changelog::default());
        }

        let rollback = !self.is_ancestor(from, to).await? && self.is_ancestor(to, from).await?;
        let range = if rollback {
            format!("{to}..{from}")
        } else {
            format!("{from}..{to}")
        };

        let mut args = vec!["log", "--format=medium"];
        if rollback {
            args.push("--reverse");
        }
        args.push(&range);

        let text = self.run_ok(&args).await?;
        Ok(Changelog { text, rollback })
    }
}
