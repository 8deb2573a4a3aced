//! # Bugtrail CLI
//!
//! The `bugtrail` binary fetches open defects from the configured work-item
//! tracker, scores recent commits against each one, and prints the ranked
//! suspects — or serves the same data as a JSON API for a dashboard.
//!
//! ## Usage
//!
//! ```bash
//! bugtrail --config ./config/bugtrail.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bugtrail triage` | Rank likely commits for recently created bugs |
//! | `bugtrail triage --bug-id N` | Triage a single bug (runs AI analysis if enabled) |
//! | `bugtrail serve api` | Start the dashboard HTTP API |
//!
//! Secrets come from the environment: `AZURE_DEVOPS_PAT`, `GITHUB_TOKEN`,
//! and `ANTHROPIC_API_KEY` when the Anthropic analysis provider is enabled.

mod analysis;
mod commits;
mod config;
mod http;
mod models;
mod pipeline;
mod rank;
mod server;
mod text;
mod tracker;
mod traits;
mod triage;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bugtrail — correlate open tracker defects with recent commits.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bugtrail.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bugtrail",
    about = "Bugtrail — rank the commits most likely responsible for open bugs",
    version,
    long_about = "Bugtrail fetches open defects from an Azure DevOps project and recent \
    commits from a GitHub repository, scores every (defect, commit) pair with a token-overlap \
    heuristic, and surfaces the likeliest suspect commits via a CLI report or a JSON API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bugtrail.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Rank likely suspect commits for recently created bugs.
    ///
    /// Fetches bugs matching the configured filter and the most recent
    /// commits, then prints the ranked suspects per bug. With `--bug-id`,
    /// analyzes that single bug and includes the AI analysis when an
    /// analysis provider is configured.
    Triage {
        /// Analyze a single bug id instead of sweeping recent ones.
        #[arg(long)]
        bug_id: Option<u32>,

        /// Override the configured minimum relevance score.
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Start the dashboard HTTP API.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Serve the JSON triage API on the configured bind address.
    Api,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bugtrail=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Triage { bug_id, min_score } => {
            triage::run_triage_command(&cfg, bug_id, min_score).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
