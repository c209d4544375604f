// ABOUTME: Entry point for the catapult CLI application.
// ABOUTME: Parses arguments, loads configuration, and dispatches to command handlers.

mod cli;
mod commands;

use catapult::config::{self, EnvOverrides, LedgerConfig};
use catapult::error::Result;
use catapult::output::{Output, OutputMode};
use clap::Parser;
use cli::{Cli, Commands, DeployCommand, Format, ReleaseCommand, ResourceCommand};
use commands::{DeployStart, NewRelease};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = match cli.format {
        Some(Format::Human) => OutputMode::Human,
        Some(Format::Json) => OutputMode::Json,
        None => OutputMode::detect(),
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

fn load_config(cli_path: Option<&std::path::Path>) -> Result<LedgerConfig> {
    let overrides = EnvOverrides::from_env();
    match cli_path {
        Some(path) => LedgerConfig::load(path, &overrides),
        None => LedgerConfig::discover(&env::current_dir()?, &overrides),
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match cli.command {
        Commands::Init {
            release_bucket,
            deploy_bucket,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(
                &cwd,
                release_bucket.as_deref(),
                deploy_bucket.as_deref(),
                force,
            )?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Release(command) => {
            let config = load_config(cli.config.as_deref())?;
            let stores = commands::connect(&config).await?;
            let repo = env::current_dir()?;
            match command {
                ReleaseCommand::New {
                    app,
                    commit,
                    version,
                    image,
                    no_image,
                    changelog,
                    no_tag,
                    rollback,
                    dry,
                } => {
                    let args = NewRelease {
                        app,
                        commit,
                        version,
                        image,
                        no_image,
                        changelog,
                        no_tag,
                        rollback,
                        dry,
                    };
                    commands::release_new(&config, &stores, &repo, args, output).await
                }
                ReleaseCommand::Find { app, commit } => {
                    commands::release_find(&config, &stores, &repo, &app, &commit, output).await
                }
                ReleaseCommand::Log {
                    app,
                    range,
                    resolve,
                } => {
                    commands::release_log(&config, &stores, &repo, &app, &range, resolve, output)
                        .await
                }
                ReleaseCommand::Current { app } => {
                    commands::release_current(&stores, &app, output).await
                }
                ReleaseCommand::Get { app, version } => {
                    commands::release_get(&stores, &app, &version, output).await
                }
                ReleaseCommand::Ls { app, last } => {
                    commands::release_ls(&config, &stores, &repo, &app, last, output).await
                }
            }
        }
        Commands::Deploy(command) => {
            let config = load_config(cli.config.as_deref())?;
            // Fail on a missing deploy bucket before prompting for credentials
            config.deploy_bucket()?;
            let stores = commands::connect(&config).await?;
            match command {
                DeployCommand::Start {
                    app,
                    env,
                    version,
                    rollback,
                    dry,
                } => {
                    let args = DeployStart {
                        app,
                        env,
                        version,
                        rollback,
                        dry,
                    };
                    commands::deploy_start(&config, &stores, args, output).await
                }
                DeployCommand::Current { app, env } => {
                    commands::deploy_current(&stores, &app, &env, output).await
                }
                DeployCommand::Ls { app, env, last } => {
                    commands::deploy_ls(&stores, &app, &env, last, output).await
                }
            }
        }
        Commands::Projects => {
            let config = load_config(cli.config.as_deref())?;
            let stores = commands::connect(&config).await?;
            commands::projects(&config, &stores, output).await
        }
        Commands::Resource(command) => match command {
            ResourceCommand::Check => commands::resource_check().await,
            ResourceCommand::In { dir } => commands::resource_in(&dir).await,
            ResourceCommand::Out { dir } => commands::resource_out(&dir).await,
        },
    }
}
