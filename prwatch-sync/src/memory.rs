//! In-memory surface with an operation log.
//!
//! Shares [`BrowserState`] semantics with the file-backed surface and records
//! every call, so callers can assert on call counts and ordering.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use prwatch_core::types::{BookmarkId, BookmarkNode, GroupId, Tab, TabGroup, TabId};

use crate::browser_state::BrowserState;
use crate::error::SurfaceError;
use crate::surface::{BookmarkSurface, TabSurface};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    SearchBookmarks { title: String },
    CreateFolder { title: String },
    ListChildren { folder: BookmarkId },
    CreateBookmark { url: String },
    RemoveBookmark { id: BookmarkId },
    GetGroup { id: GroupId },
    ListGroupTabs { id: GroupId },
    CreateTab { url: String },
    RemoveTabs { ids: Vec<TabId> },
    CreateGroup { tabs: Vec<TabId> },
    AddToGroup { group: GroupId, tabs: Vec<TabId> },
    UpdateGroup { group: GroupId, title: String, collapsed: bool },
}

impl SurfaceOp {
    /// True for calls that change surface state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            SurfaceOp::SearchBookmarks { .. }
                | SurfaceOp::ListChildren { .. }
                | SurfaceOp::GetGroup { .. }
                | SurfaceOp::ListGroupTabs { .. }
        )
    }
}

#[derive(Debug, Default)]
pub struct MemorySurface {
    state: Mutex<BrowserState>,
    ops: Mutex<Vec<SurfaceOp>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current browser state.
    pub fn snapshot(&self) -> BrowserState {
        lock(&self.state).clone()
    }

    /// Mutate state directly, bypassing the op log (external interference).
    pub fn with_state<T>(&self, f: impl FnOnce(&mut BrowserState) -> T) -> T {
        f(&mut lock(&self.state))
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        lock(&self.ops).clone()
    }

    pub fn mutations(&self) -> Vec<SurfaceOp> {
        self.ops().into_iter().filter(SurfaceOp::is_mutation).collect()
    }

    pub fn clear_ops(&self) {
        lock(&self.ops).clear();
    }

    /// Folders anywhere in the tree titled `title`.
    pub fn folders_titled(&self, title: &str) -> Vec<BookmarkNode> {
        lock(&self.state)
            .search_by_title(title)
            .into_iter()
            .filter(BookmarkNode::is_folder)
            .collect()
    }

    /// Sorted URLs of the bookmarks inside the first folder titled `title`.
    pub fn bookmark_urls(&self, title: &str) -> Vec<String> {
        let Some(folder) = self.folders_titled(title).into_iter().next() else {
            return vec![];
        };
        let mut urls: Vec<String> = lock(&self.state)
            .children(&folder.id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|n| n.url)
            .collect();
        urls.sort();
        urls
    }

    /// Sorted URLs of the tabs in `group`; empty when the group is gone.
    pub fn group_urls(&self, group: GroupId) -> Vec<String> {
        let mut urls: Vec<String> = lock(&self.state)
            .tabs_in_group(group)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.url)
            .collect();
        urls.sort();
        urls
    }

    fn record(&self, op: SurfaceOp) {
        lock(&self.ops).push(op);
    }
}

#[async_trait]
impl BookmarkSurface for MemorySurface {
    async fn search_by_title(&self, title: &str) -> Result<Vec<BookmarkNode>, SurfaceError> {
        self.record(SurfaceOp::SearchBookmarks {
            title: title.to_string(),
        });
        Ok(lock(&self.state).search_by_title(title))
    }

    async fn create_folder(
        &self,
        parent: &BookmarkId,
        title: &str,
        index: Option<usize>,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.record(SurfaceOp::CreateFolder {
            title: title.to_string(),
        });
        lock(&self.state).create_folder(parent, title, index)
    }

    async fn children(&self, folder: &BookmarkId) -> Result<Vec<BookmarkNode>, SurfaceError> {
        self.record(SurfaceOp::ListChildren {
            folder: folder.clone(),
        });
        lock(&self.state).children(folder)
    }

    async fn create_bookmark(
        &self,
        parent: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.record(SurfaceOp::CreateBookmark {
            url: url.to_string(),
        });
        lock(&self.state).create_bookmark(parent, title, url)
    }

    async fn remove(&self, id: &BookmarkId) -> Result<(), SurfaceError> {
        self.record(SurfaceOp::RemoveBookmark { id: id.clone() });
        lock(&self.state).remove_bookmark(id)
    }
}

#[async_trait]
impl TabSurface for MemorySurface {
    async fn get_group(&self, id: GroupId) -> Result<Option<TabGroup>, SurfaceError> {
        self.record(SurfaceOp::GetGroup { id });
        Ok(lock(&self.state).get_group(id))
    }

    async fn tabs_in_group(&self, id: GroupId) -> Result<Vec<Tab>, SurfaceError> {
        self.record(SurfaceOp::ListGroupTabs { id });
        lock(&self.state).tabs_in_group(id)
    }

    async fn create_tab(&self, url: &str, active: bool) -> Result<Tab, SurfaceError> {
        self.record(SurfaceOp::CreateTab {
            url: url.to_string(),
        });
        Ok(lock(&self.state).create_tab(url, active))
    }

    async fn remove_tabs(&self, ids: &[TabId]) -> Result<(), SurfaceError> {
        self.record(SurfaceOp::RemoveTabs { ids: ids.to_vec() });
        lock(&self.state).remove_tabs(ids)
    }

    async fn create_group(&self, tabs: &[TabId]) -> Result<GroupId, SurfaceError> {
        self.record(SurfaceOp::CreateGroup {
            tabs: tabs.to_vec(),
        });
        lock(&self.state).create_group(tabs)
    }

    async fn add_to_group(&self, group: GroupId, tabs: &[TabId]) -> Result<(), SurfaceError> {
        self.record(SurfaceOp::AddToGroup {
            group,
            tabs: tabs.to_vec(),
        });
        lock(&self.state).add_to_group(group, tabs)
    }

    async fn update_group(
        &self,
        group: GroupId,
        title: &str,
        collapsed: bool,
    ) -> Result<(), SurfaceError> {
        self.record(SurfaceOp::UpdateGroup {
            group,
            title: title.to_string(),
            collapsed,
        });
        lock(&self.state).update_group(group, title, collapsed)
    }
}
