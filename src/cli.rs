//! Command-line interface: argument parsing and wiring of the real backends.
//!
//! All orchestration lives in [`crate::dispatch`] and [`crate::aggregate`];
//! this module only loads the config, builds the GitHub client, the shell
//! builder and the `repo-add` indexer, and hands them over.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::aggregate::{aggregate, AggregateOutcome};
use crate::build::ShellBuilder;
use crate::ci_output::CiOutput;
use crate::dispatch::dispatch;
use crate::github::GitHubClient;
use crate::load_config::load_config;
use crate::repo_index::RepoAdd;

/// CLI for aur-mirror: build AUR packages and publish them as a pacman repository.
#[derive(Parser)]
#[clap(
    name = "aur-mirror",
    version,
    about = "Build AUR packages tagged in a GitHub organization and publish them as a pacman repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every package repository and create a release for each new version
    Dispatch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Rebuild the aggregate release from all package releases
    Release {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Dispatch { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "dispatch", "Starting dispatcher");
            let github = GitHubClient::from_config(&config)?;
            let builder = ShellBuilder::new(config.build_user.clone());
            let report = dispatch(&github, &builder, &config).await.map_err(|e| {
                tracing::error!(command = "dispatch", error = %e, "Dispatch failed");
                anyhow::Error::new(e)
            })?;
            tracing::info!(command = "dispatch", ?report, "Dispatch complete");
            Ok(())
        }
        Commands::Release { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "release", "Starting release aggregation");
            let github = GitHubClient::from_config(&config)?;
            let outcome = aggregate(&github, &RepoAdd, &config, &CiOutput::from_env())
                .await
                .map_err(|e| {
                    tracing::error!(command = "release", error = %e, "Release aggregation failed");
                    anyhow::Error::new(e)
                })?;
            match outcome {
                AggregateOutcome::Skipped => {
                    tracing::info!(command = "release", "No changes to the aggregate release")
                }
                AggregateOutcome::Updated(report) => {
                    tracing::info!(command = "release", ?report, "Aggregate release updated")
                }
            }
            Ok(())
        }
    }
}
