//! prwatch: mirror your open GitHub pull requests into a bookmark folder
//! and a tab group.
//!
//! # Usage
//!
//! ```text
//! prwatch config set-token <token>
//! prwatch config show
//! prwatch config test [--token <token>]
//! prwatch repo add|remove <owner/name>
//! prwatch repo list
//! prwatch update [--dry-run]
//! prwatch status [--json]
//! prwatch daemon start|stop|status
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, daemon::DaemonCommand, repo::RepoCommand, status::StatusArgs,
    update::UpdateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "prwatch",
    version,
    about = "Keep a bookmark folder and tab group in sync with your open pull requests",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the GitHub token and view settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage the watched repositories.
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Fetch pull requests and update bookmarks and tabs now.
    Update(UpdateArgs),

    /// Show last update time, repositories and daemon state.
    Status(StatusArgs),

    /// Run or control the background updater.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Repo { command } => commands::repo::run(command),
        Commands::Update(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
