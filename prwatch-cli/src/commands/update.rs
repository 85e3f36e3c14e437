//! `prwatch update`: run one cycle now, through the daemon when it is up.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;

use prwatch_daemon::{init_tracing, plan_blocking, request_update, update_blocking, DaemonError};
use prwatch_sync::{CyclePlan, PlanOutcome, SkipReason};

use crate::home_dir;

/// Arguments for `prwatch update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Show what would change without touching bookmarks or tabs.
    #[arg(long)]
    pub dry_run: bool,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;

        if self.dry_run {
            init_tracing();
            match plan_blocking(&home).context("dry run failed")? {
                PlanOutcome::Skipped(reason) => println!("Nothing to do: {reason}."),
                PlanOutcome::Planned(plan) => print_plan(&plan),
            }
            return Ok(());
        }

        let outcome = match request_update(&home) {
            Ok(outcome) => outcome,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                init_tracing();
                let outcome = update_blocking(&home).context("update failed")?;
                serde_json::to_value(outcome).context("failed to encode update result")?
            }
            Err(DaemonError::Protocol(message)) => {
                return Err(anyhow!(message).context("update failed"));
            }
            Err(err) => return Err(err).context("failed to reach daemon"),
        };

        print_outcome(&outcome);
        Ok(())
    }
}

fn print_outcome(outcome: &Value) {
    match outcome["status"].as_str() {
        Some("completed") => {
            println!(
                "{} Updated {} pull requests for {} across {} repositories",
                "✓".green(),
                outcome["items"],
                outcome["user"].as_str().unwrap_or("?").bold(),
                outcome["repositories"],
            );
            for surface in ["bookmarks", "tabs"] {
                let report = &outcome[surface];
                println!(
                    "  {surface:<9} +{} -{}{}",
                    report["created"],
                    report["removed"],
                    if report["bootstrapped"].as_bool() == Some(true) {
                        " (created)"
                    } else {
                        ""
                    }
                );
            }
        }
        Some("skipped") => match SkipReason::deserialize(&outcome["reason"]) {
            Ok(reason) => println!("Nothing to do: {reason}."),
            Err(_) => println!("Nothing to do."),
        },
        _ => println!("{outcome}"),
    }
}

fn print_plan(plan: &CyclePlan) {
    println!(
        "[dry-run] {} pull requests would be mirrored",
        plan.targets.len()
    );

    let bookmarks = &plan.bookmarks;
    if bookmarks.folder.is_none() {
        println!("  would create bookmark folder");
    }
    for key in &bookmarks.diff.missing {
        println!("  {} bookmark {key}", "+".green());
    }
    for id in &bookmarks.diff.stale {
        println!("  {} bookmark #{id}", "-".red());
    }

    let tabs = &plan.tabs;
    if let Some(stale) = tabs.stale_handle {
        println!("  stored tab group {stale} no longer exists");
    }
    if tabs.group.is_none() && !tabs.diff.missing.is_empty() {
        println!("  would create tab group");
    }
    for key in &tabs.diff.missing {
        println!("  {} tab {key}", "+".green());
    }
    for id in &tabs.diff.stale {
        println!("  {} tab #{id}", "-".red());
    }

    if bookmarks.diff.is_empty() && tabs.diff.is_empty() {
        println!("  already up to date");
    }
}
