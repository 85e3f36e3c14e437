//! Bookmark-folder reconciliation.
//!
//! The folder is located by exact title on every run; nothing about it is
//! persisted. A folder is created only when the lookup finds none.

use prwatch_core::types::{BookmarkId, BookmarkNode, ItemKey, TargetSet};

use crate::diff::{diff_surface, ReconcileReport, SurfaceDiff};
use crate::error::{SurfaceError, SyncError};
use crate::surface::BookmarkSurface;

/// Read-only view of what [`BookmarkReconciler::reconcile`] would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkPlan {
    /// `None` means the folder does not exist yet and would be created.
    pub folder: Option<BookmarkNode>,
    pub diff: SurfaceDiff<BookmarkId>,
}

pub struct BookmarkReconciler<'a> {
    surface: &'a dyn BookmarkSurface,
    folder_title: &'a str,
}

impl<'a> BookmarkReconciler<'a> {
    pub fn new(surface: &'a dyn BookmarkSurface, folder_title: &'a str) -> Self {
        Self {
            surface,
            folder_title,
        }
    }

    /// First folder (no URL) whose title matches exactly.
    pub async fn find_folder(&self) -> Result<Option<BookmarkNode>, SurfaceError> {
        let candidates = self.surface.search_by_title(self.folder_title).await?;
        Ok(candidates
            .into_iter()
            .find(|node| node.title == self.folder_title && node.is_folder()))
    }

    pub async fn plan(&self, target: &TargetSet) -> Result<BookmarkPlan, SyncError> {
        let folder = self.find_folder().await?;
        let existing = match &folder {
            Some(folder) => self.surface.children(&folder.id).await?,
            None => vec![],
        };
        let keyed = existing
            .into_iter()
            .filter_map(|node| node.url.map(|url| (ItemKey(url), node.id)));
        Ok(BookmarkPlan {
            folder,
            diff: diff_surface(keyed, target),
        })
    }

    /// Make the folder's bookmarks match `target`: removals first, then
    /// creations.
    pub async fn reconcile(&self, target: &TargetSet) -> Result<ReconcileReport, SyncError> {
        let plan = self.plan(target).await?;
        let mut report = ReconcileReport::default();

        let folder = match plan.folder {
            Some(folder) => folder,
            None => {
                let folder = self
                    .surface
                    .create_folder(&BookmarkId::bookmarks_bar(), self.folder_title, Some(0))
                    .await?;
                tracing::info!("created bookmark folder '{}' ({})", self.folder_title, folder.id);
                report.bootstrapped = true;
                folder
            }
        };

        for id in &plan.diff.stale {
            self.surface.remove(id).await?;
            report.removed += 1;
        }

        for key in &plan.diff.missing {
            let title = target
                .get(key)
                .map(|item| item.title.as_str())
                .unwrap_or(key.as_str());
            self.surface
                .create_bookmark(&folder.id, title, key.as_str())
                .await?;
            report.created += 1;
        }

        tracing::debug!(
            "bookmarks reconciled: {} created, {} removed, {} kept",
            report.created,
            report.removed,
            plan.diff.kept
        );
        Ok(report)
    }
}
