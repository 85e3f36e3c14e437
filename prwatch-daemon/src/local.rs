//! Blocking in-process entrypoints, used by the CLI when no daemon answers
//! on the socket.

use std::path::Path;

use prwatch_core::store::load_settings_at;
use prwatch_core::types::{Token, Username};
use prwatch_github::GitHubClient;
use prwatch_sync::{CycleOutcome, PlanOutcome};

use crate::error::{io_err, DaemonError};
use crate::lock::run_locked_cycle;
use crate::runtime::build_orchestrator;

fn current_thread() -> Result<tokio::runtime::Runtime, DaemonError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))
}

/// Run one cycle against the files under `home`, skipped as busy while
/// another process holds the cycle lock.
pub fn update_blocking(home: &Path) -> Result<CycleOutcome, DaemonError> {
    let orchestrator = build_orchestrator(home)?;
    current_thread()?.block_on(run_locked_cycle(home, &orchestrator))
}

/// Compute both reconcilers' plans without applying them.
pub fn plan_blocking(home: &Path) -> Result<PlanOutcome, DaemonError> {
    let orchestrator = build_orchestrator(home)?;
    let plan = current_thread()?.block_on(orchestrator.plan_cycle())?;
    Ok(plan)
}

/// Identity lookup for `token` against the configured API base.
pub fn test_connection_blocking(home: &Path, token: &Token) -> Result<Username, DaemonError> {
    let settings = load_settings_at(home)?;
    let client = GitHubClient::new(settings.api_base);
    let user = current_thread()?.block_on(prwatch_sync::test_connection(&client, token))?;
    Ok(user)
}
