//! `prwatch config`: token management and settings display.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use prwatch_core::store::{config_path_at, load_settings_at, set_token_at};
use prwatch_core::types::Token;
use prwatch_daemon::test_connection_blocking;

use crate::home_dir;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Store a GitHub personal access token.
    SetToken(SetTokenArgs),

    /// Print the current settings with the token redacted.
    Show,

    /// Check a token against the GitHub API without touching any repository.
    Test(TestArgs),
}

#[derive(Args, Debug)]
pub struct SetTokenArgs {
    pub token: String,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Token to test instead of the stored one; saved when the test passes.
    #[arg(long)]
    pub token: Option<String>,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        ConfigCommand::SetToken(args) => {
            let token = args.token.trim();
            if token.is_empty() {
                anyhow::bail!("token must not be empty");
            }
            set_token_at(&home, Token::new(token)).context("failed to save token")?;
            println!("✓ Token saved to {}", config_path_at(&home).display());
        }
        ConfigCommand::Show => {
            let settings = load_settings_at(&home).context("failed to load settings")?;
            println!("config:     {}", config_path_at(&home).display());
            println!(
                "token:      {}",
                settings
                    .token
                    .as_ref()
                    .map(Token::redacted)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("interval:   {} minutes", settings.interval_minutes);
            println!("folder:     {}", settings.bookmark_folder);
            println!("tab group:  {}", settings.tab_group);
            println!("api base:   {}", settings.api_base);
            println!("repositories: {}", settings.repositories.len());
            for repo in &settings.repositories {
                println!("  - {repo}");
            }
        }
        ConfigCommand::Test(args) => {
            let candidate = args.token.as_deref().map(str::trim).map(Token::new);
            let token = match &candidate {
                Some(token) => token.clone(),
                None => load_settings_at(&home)
                    .context("failed to load settings")?
                    .token
                    .context("no GitHub token configured; run `prwatch config set-token <token>`")?,
            };

            let user = test_connection_blocking(&home, &token).context("connection test failed")?;
            println!("{} Connected as {}", "✓".green(), user.to_string().bold());

            if let Some(token) = candidate {
                set_token_at(&home, token).context("failed to save token")?;
                println!("✓ Token saved to {}", config_path_at(&home).display());
            }
        }
    }

    Ok(())
}
