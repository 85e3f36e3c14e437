//! `prwatch status`: last update time, repositories and daemon state.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use prwatch_core::store::{load_settings_at, load_state_at};
use prwatch_core::types::RepoSlug;
use prwatch_daemon::{send_request, DaemonError, DaemonRequest};

use crate::home_dir;

/// Arguments for `prwatch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let report = build_report(&home)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report, Utc::now());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    token_configured: bool,
    last_update: Option<DateTime<Utc>>,
    group_id: Option<u64>,
    repositories: Vec<RepositoryStatus>,
    daemon: DaemonStatus,
}

#[derive(Debug, Serialize)]
struct RepositoryStatus {
    repository: String,
    valid: bool,
}

#[derive(Debug, Serialize)]
struct DaemonStatus {
    running: bool,
    in_progress: bool,
}

#[derive(Tabled)]
struct RepositoryRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "slug")]
    slug: String,
}

fn build_report(home: &Path) -> Result<StatusReport> {
    let settings = load_settings_at(home).context("failed to load settings")?;
    let state = load_state_at(home).context("failed to load state")?;

    let repositories = settings
        .repositories
        .iter()
        .map(|raw| RepositoryStatus {
            repository: raw.clone(),
            valid: raw.parse::<RepoSlug>().is_ok(),
        })
        .collect();

    Ok(StatusReport {
        token_configured: settings.token.is_some(),
        last_update: state.last_update,
        group_id: state.group_id.map(|id| id.0),
        repositories,
        daemon: query_daemon(home)?,
    })
}

/// Single attempt, no retry: a missing socket just means "not running".
fn query_daemon(home: &Path) -> Result<DaemonStatus> {
    match send_request(home, &DaemonRequest::new("status")) {
        Ok(response) if response.ok => {
            let data = response.data.unwrap_or(Value::Null);
            Ok(DaemonStatus {
                running: true,
                in_progress: data["in_progress"].as_bool().unwrap_or(false),
            })
        }
        Ok(response) => Err(anyhow::anyhow!(response
            .error
            .unwrap_or_else(|| "unknown daemon error".to_string())))
        .context("daemon status failed"),
        Err(DaemonError::DaemonNotRunning { .. }) => Ok(DaemonStatus {
            running: false,
            in_progress: false,
        }),
        Err(err) => Err(err).context("failed to query daemon status"),
    }
}

fn print_table(report: &StatusReport, now: DateTime<Utc>) {
    let daemon = match (report.daemon.running, report.daemon.in_progress) {
        (true, true) => "running (updating)".green().to_string(),
        (true, false) => "running".green().to_string(),
        (false, _) => "stopped".bright_black().to_string(),
    };
    println!(
        "prwatch v{} | {} repositories | daemon {}",
        env!("CARGO_PKG_VERSION"),
        report.repositories.len(),
        daemon,
    );
    println!("last update: {}", format_age(report.last_update, now));
    match report.group_id {
        Some(id) => println!("tab group:   #{id}"),
        None => println!("tab group:   (none yet)"),
    }
    if !report.token_configured {
        println!("{}", "No GitHub token configured.".yellow());
    }

    if report.repositories.is_empty() {
        println!("No repositories configured.");
        return;
    }

    let rows: Vec<RepositoryRow> = report
        .repositories
        .iter()
        .map(|repo| RepositoryRow {
            repository: repo.repository.clone(),
            slug: if repo.valid {
                "ok".to_string()
            } else {
                "invalid".red().to_string()
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// "never", or a coarse age such as "5 minutes ago".
fn format_age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };
    let secs = (now - at).num_seconds().max(0);
    let (value, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3599 => (secs / 60, "minute"),
        3600..=86_399 => (secs / 3600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural} ago")
}
