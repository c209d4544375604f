// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines release, deploy, projects, and resource subcommands.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catapult")]
#[command(about = "Release and deploy ledger on a versioned object store")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: discovered upwards)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (default: human on a terminal, JSON otherwise)
    #[arg(long, global = true, value_enum)]
    pub format: Option<Format>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new catapult.yml configuration file
    Init {
        /// Bucket holding release history
        #[arg(long)]
        release_bucket: Option<String>,

        /// Bucket holding deploy history
        #[arg(long)]
        deploy_bucket: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Create and inspect releases
    #[command(subcommand)]
    Release(ReleaseCommand),

    /// Record and inspect deploys
    #[command(subcommand)]
    Deploy(DeployCommand),

    /// List applications with their latest release and current deploys
    Projects,

    /// Pipeline resource protocol (JSON on stdin and stdout)
    #[command(subcommand)]
    Resource(ResourceCommand),
}

#[derive(Subcommand)]
pub enum ReleaseCommand {
    /// Record a new release
    #[command(group(
        ArgGroup::new("image_source")
            .required(true)
            .args(["image", "no_image"])
    ))]
    New {
        app: String,

        /// Commit to release
        #[arg(long, default_value = "HEAD")]
        commit: String,

        /// Release under this version instead of the next one
        #[arg(long)]
        version: Option<String>,

        /// Image identifier, such as a content digest
        #[arg(long)]
        image: Option<String>,

        /// The application produces no image
        #[arg(long)]
        no_image: bool,

        /// Changelog text (default: git log since the previous release)
        #[arg(long)]
        changelog: Option<String>,

        /// Do not create the <app>-v<version> tag
        #[arg(long)]
        no_tag: bool,

        /// Confirm a release whose commit is behind the previous release
        #[arg(long)]
        rollback: bool,

        /// Show the release without recording it
        #[arg(long)]
        dry: bool,
    },

    /// Find the first release containing a commit
    Find {
        app: String,

        /// Commit to look for
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },

    /// Show the git log between two releases or refs
    Log {
        app: String,

        /// Range as <start>..<end>; `v<N>` names release N
        range: String,

        /// Print the range as git refs instead of the log
        #[arg(long)]
        resolve: bool,
    },

    /// Show the latest release
    Current { app: String },

    /// Show a specific release
    Get { app: String, version: String },

    /// List release history, newest first
    Ls {
        app: String,

        /// Only the most recent N releases
        #[arg(long)]
        last: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum DeployCommand {
    /// Record a deploy of a release into an environment
    Start {
        app: String,
        env: String,

        /// Release to deploy (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Confirm a deploy that moves the environment to an older version
        #[arg(long)]
        rollback: bool,

        /// Show the deploy without recording it
        #[arg(long)]
        dry: bool,
    },

    /// Show the deploy currently active in an environment
    Current { app: String, env: String },

    /// List deploy history, newest first
    Ls {
        app: String,
        env: String,

        /// Only the most recent N deploys
        #[arg(long)]
        last: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ResourceCommand {
    /// Report versions newer than the one given on stdin
    Check,

    /// Write the requested version into a directory
    In { dir: PathBuf },

    /// Record a release or deploy using sources in a directory
    Out { dir: PathBuf },
}
