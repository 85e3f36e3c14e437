//! Tab-group reconciliation.
//!
//! Groups have no stable name lookup, so the group created on first run is
//! remembered through the persisted group handle. A handle that no longer
//! resolves is cleared and the group is rebuilt from scratch.

use futures::future::join_all;

use prwatch_core::store::StateStore;
use prwatch_core::types::{GroupId, ItemKey, TabGroup, TabId, TargetSet};

use crate::diff::{diff_surface, ReconcileReport, SurfaceDiff};
use crate::error::{SurfaceError, SyncError};
use crate::surface::TabSurface;

/// Read-only view of what [`TabGroupReconciler::reconcile`] would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabPlan {
    /// Group resolved from the stored handle; `None` if absent or gone.
    pub group: Option<TabGroup>,
    /// Stored handle that did not resolve and would be cleared.
    pub stale_handle: Option<GroupId>,
    pub diff: SurfaceDiff<TabId>,
}

pub struct TabGroupReconciler<'a> {
    surface: &'a dyn TabSurface,
    store: &'a dyn StateStore,
    group_title: &'a str,
}

impl<'a> TabGroupReconciler<'a> {
    pub fn new(
        surface: &'a dyn TabSurface,
        store: &'a dyn StateStore,
        group_title: &'a str,
    ) -> Self {
        Self {
            surface,
            store,
            group_title,
        }
    }

    pub async fn plan(&self, target: &TargetSet) -> Result<TabPlan, SyncError> {
        let (group, stale_handle) = match self.store.group_handle()? {
            Some(id) => match self.surface.get_group(id).await? {
                Some(group) => (Some(group), None),
                None => (None, Some(id)),
            },
            None => (None, None),
        };

        let existing = match &group {
            Some(group) => self.surface.tabs_in_group(group.id).await?,
            None => vec![],
        };
        let keyed = existing
            .into_iter()
            .filter_map(|tab| tab.url.map(|url| (ItemKey(url), tab.id)));

        Ok(TabPlan {
            group,
            stale_handle,
            diff: diff_surface(keyed, target),
        })
    }

    /// Make the group's tabs match `target`: one batched close, then opens.
    pub async fn reconcile(&self, target: &TargetSet) -> Result<ReconcileReport, SyncError> {
        let plan = self.plan(target).await?;
        let mut report = ReconcileReport::default();

        if let Some(stale) = plan.stale_handle {
            tracing::warn!("tab group {stale} no longer exists; forgetting it");
            self.store.clear_group_handle()?;
        }

        let mut group = plan.group.map(|g| g.id);

        if !plan.diff.stale.is_empty() {
            self.surface.remove_tabs(&plan.diff.stale).await?;
            report.removed = plan.diff.stale.len();

            // Closing every member dissolves the group.
            if let Some(id) = group.filter(|_| plan.diff.kept == 0) {
                if self.surface.get_group(id).await?.is_none() {
                    self.store.clear_group_handle()?;
                    group = None;
                }
            }
        }

        let missing = plan.diff.missing;
        if missing.is_empty() {
            return Ok(report);
        }

        match group {
            Some(id) => self.open_into_group(id, &missing).await?,
            None => {
                let (first, rest) = missing.split_first().ok_or(SurfaceError::EmptyGroup)?;
                let id = self.bootstrap_group(first).await?;
                report.bootstrapped = true;
                if !rest.is_empty() {
                    self.open_into_group(id, rest).await?;
                }
            }
        }
        report.created = missing.len();

        tracing::debug!(
            "tabs reconciled: {} created, {} removed, {} kept",
            report.created,
            report.removed,
            plan.diff.kept
        );
        Ok(report)
    }

    /// Open the first tab, build the group around it and persist its id.
    async fn bootstrap_group(&self, first: &ItemKey) -> Result<GroupId, SyncError> {
        let tab = self.surface.create_tab(first.as_str(), false).await?;
        let id = self
            .surface
            .create_group(&[tab.id])
            .await
            .inspect_err(|err| tracing::warn!("tab {} left ungrouped: {err}", tab.id))?;

        let recorded = match self.surface.update_group(id, self.group_title, true).await {
            Ok(()) => self.store.set_group_handle(id).map_err(SyncError::from),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = &recorded {
            tracing::warn!("tab group {id} created but not recorded: {err}");
        }
        recorded?;

        tracing::info!("created tab group '{}' ({id})", self.group_title);
        Ok(id)
    }

    /// Open background tabs for `urls` concurrently and group them in one
    /// batch. Tabs that did open are grouped even when a sibling failed, so
    /// the next cycle finds them instead of opening them again.
    async fn open_into_group(&self, group: GroupId, urls: &[ItemKey]) -> Result<(), SyncError> {
        let results = join_all(
            urls.iter()
                .map(|url| self.surface.create_tab(url.as_str(), false)),
        )
        .await;

        let mut opened = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(tab) => opened.push(tab.id),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        if !opened.is_empty() {
            self.surface
                .add_to_group(group, &opened)
                .await
                .inspect_err(|err| {
                    tracing::warn!("tabs {opened:?} left outside group {group}: {err}")
                })?;
        }
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
