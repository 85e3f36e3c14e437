//! `prwatch repo add|remove|list`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use prwatch_core::store::{add_repository_at, load_settings_at, remove_repository_at};

use crate::home_dir;

/// Manage the repositories whose pull requests are mirrored.
#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Watch a repository, given as `owner/name`.
    Add(RepoArgs),

    /// Stop watching a repository.
    Remove(RepoArgs),

    /// List watched repositories.
    List,
}

#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Repository slug, e.g. "rust-lang/cargo".
    pub repository: String,
}

pub fn run(cmd: RepoCommand) -> Result<()> {
    let home = home_dir()?;

    match cmd {
        RepoCommand::Add(args) => {
            let slug = add_repository_at(&home, &args.repository)
                .with_context(|| format!("failed to add '{}'", args.repository))?;
            println!("✓ Added {slug}");
        }
        RepoCommand::Remove(args) => {
            remove_repository_at(&home, &args.repository)
                .with_context(|| format!("failed to remove '{}'", args.repository))?;
            println!("✓ Removed {}", args.repository.trim());
        }
        RepoCommand::List => {
            let settings = load_settings_at(&home).context("failed to load settings")?;
            if settings.repositories.is_empty() {
                println!("No repositories configured.");
                println!("Run: prwatch repo add <owner/name>");
                return Ok(());
            }
            for repo in &settings.repositories {
                println!("{repo}");
            }
        }
    }

    Ok(())
}
