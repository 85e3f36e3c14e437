//! Shared sync pipeline entrypoint used by CLI and daemon.
//!
//! One cycle: read settings → resolve the current user → fetch every
//! configured repository → merge into a [`TargetSet`] → reconcile bookmarks,
//! then tabs → record the completion time.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use prwatch_core::store::StateStore;
use prwatch_core::types::{RepoSlug, Settings, TargetSet, Token, Username};
use prwatch_github::{fetch_relevant, FetchError, ItemSource};

use crate::bookmarks::{BookmarkPlan, BookmarkReconciler};
use crate::diff::ReconcileReport;
use crate::error::SyncError;
use crate::surface::{BookmarkSurface, TabSurface};
use crate::tabs::{TabGroupReconciler, TabPlan};

/// Whether a cycle is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Idle,
    Running,
}

/// Why a cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another cycle was already running.
    Busy,
    NoCredential,
    NoRepositories,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Busy => write!(f, "an update is already in progress"),
            SkipReason::NoCredential => write!(f, "no GitHub token configured"),
            SkipReason::NoRepositories => write!(f, "no repositories configured"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub user: String,
    pub repositories: usize,
    pub items: usize,
    pub bookmarks: ReconcileReport,
    pub tabs: ReconcileReport,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Skipped { reason: SkipReason },
    Completed(CycleSummary),
}

/// Dry-run result: the target set and both reconcilers' plans.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub targets: TargetSet,
    pub bookmarks: BookmarkPlan,
    pub tabs: TabPlan,
}

#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Skipped(SkipReason),
    Planned(Box<CyclePlan>),
}

/// Clears the in-flight flag on every exit path.
struct CycleGuard<'a> {
    state: &'a Mutex<CycleState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = CycleState::Idle;
    }
}

/// Runs sync cycles against one provider, one store and two surfaces.
pub struct Orchestrator {
    source: Arc<dyn ItemSource>,
    store: Arc<dyn StateStore>,
    bookmarks: Arc<dyn BookmarkSurface>,
    tabs: Arc<dyn TabSurface>,
    state: Mutex<CycleState>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ItemSource>,
        store: Arc<dyn StateStore>,
        bookmarks: Arc<dyn BookmarkSurface>,
        tabs: Arc<dyn TabSurface>,
    ) -> Self {
        Self {
            source,
            store,
            bookmarks,
            tabs,
            state: Mutex::new(CycleState::Idle),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn store(&self) -> &dyn StateStore {
        &*self.store
    }

    fn try_begin(&self) -> Option<CycleGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CycleState::Running {
            return None;
        }
        *state = CycleState::Running;
        Some(CycleGuard { state: &self.state })
    }

    /// Run one cycle unless one is already in flight.
    ///
    /// Errors are logged here; the periodic trigger drops them, the manual
    /// trigger reports them.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        let Some(_guard) = self.try_begin() else {
            tracing::info!("update already in progress; skipping");
            return Ok(CycleOutcome::Skipped {
                reason: SkipReason::Busy,
            });
        };

        let result = self.execute().await;
        if let Err(err) = &result {
            tracing::error!("error updating pull requests: {err}");
        }
        result
    }

    /// Identity lookup only; no repositories are touched.
    pub async fn test_connection(&self, token: &Token) -> Result<Username, FetchError> {
        test_connection(&*self.source, token).await
    }

    /// Fetch and diff without applying anything.
    pub async fn plan_cycle(&self) -> Result<PlanOutcome, SyncError> {
        let settings = self.store.settings()?;
        let (token, repositories) = match configured(&settings) {
            Ok(pair) => pair,
            Err(reason) => return Ok(PlanOutcome::Skipped(reason)),
        };
        let user = self
            .source
            .current_user(token)
            .await
            .map_err(SyncError::Identity)?;
        let targets = self.collect_targets(token, &user, repositories).await?;

        let bookmarks = BookmarkReconciler::new(&*self.bookmarks, &settings.bookmark_folder)
            .plan(&targets)
            .await?;
        let tabs = TabGroupReconciler::new(&*self.tabs, &*self.store, &settings.tab_group)
            .plan(&targets)
            .await?;

        Ok(PlanOutcome::Planned(Box::new(CyclePlan {
            targets,
            bookmarks,
            tabs,
        })))
    }

    async fn execute(&self) -> Result<CycleOutcome, SyncError> {
        let started = Instant::now();
        let settings = self.store.settings()?;
        let (token, repositories) = match configured(&settings) {
            Ok(pair) => pair,
            Err(reason) => {
                tracing::info!("{reason}; nothing to update");
                return Ok(CycleOutcome::Skipped { reason });
            }
        };

        let user = self
            .source
            .current_user(token)
            .await
            .map_err(SyncError::Identity)?;
        let targets = &self.collect_targets(token, &user, repositories).await?;

        // Both surfaces are attempted; neither rolls back the other.
        let bookmarks = BookmarkReconciler::new(&*self.bookmarks, &settings.bookmark_folder)
            .reconcile(targets)
            .await
            .inspect_err(|err| tracing::warn!("bookmark reconciliation failed: {err}"));
        let tabs = TabGroupReconciler::new(&*self.tabs, &*self.store, &settings.tab_group)
            .reconcile(targets)
            .await
            .inspect_err(|err| tracing::warn!("tab group reconciliation failed: {err}"));
        let (bookmarks, tabs) = (bookmarks?, tabs?);

        let completed_at = Utc::now();
        self.store.record_last_update(completed_at)?;
        tracing::info!("updated {} pull requests", targets.len());

        Ok(CycleOutcome::Completed(CycleSummary {
            user: user.0,
            repositories: repositories.len(),
            items: targets.len(),
            bookmarks,
            tabs,
            completed_at,
            duration_ms: started.elapsed().as_millis(),
        }))
    }

    /// Fetch every repository concurrently and merge the relevant items.
    ///
    /// Repository-scoped failures are only logged; a rejected credential
    /// aborts.
    async fn collect_targets(
        &self,
        token: &Token,
        user: &Username,
        repositories: &[String],
    ) -> Result<TargetSet, SyncError> {
        let mut slugs = Vec::new();
        for raw in repositories {
            match raw.parse::<RepoSlug>() {
                Ok(slug) => slugs.push(slug),
                Err(err) => {
                    tracing::warn!("error fetching pull requests for {raw}: {err}");
                }
            }
        }

        let source = &*self.source;
        let results = join_all(slugs.iter().map(|repo| async move {
            (repo, fetch_relevant(source, token, repo, user).await)
        }))
        .await;

        let mut targets = TargetSet::new();
        for (repo, result) in results {
            match result {
                Ok(items) => targets.extend(items),
                Err(err) if err.is_fatal() => {
                    return Err(SyncError::RepositoryAuth {
                        repository: repo.to_string(),
                        source: err,
                    });
                }
                Err(err) => {
                    tracing::warn!("error fetching pull requests for {repo}: {err}");
                }
            }
        }
        Ok(targets)
    }
}

/// Identity lookup for a candidate credential.
pub async fn test_connection(
    source: &dyn ItemSource,
    token: &Token,
) -> Result<Username, FetchError> {
    source.current_user(token).await
}

fn configured(settings: &Settings) -> Result<(&Token, &[String]), SkipReason> {
    let token = settings.token.as_ref().ok_or(SkipReason::NoCredential)?;
    if settings.repositories.is_empty() {
        return Err(SkipReason::NoRepositories);
    }
    Ok((token, &settings.repositories))
}
