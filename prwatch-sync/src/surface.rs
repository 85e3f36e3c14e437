//! Presentation surfaces the reconcilers drive.
//!
//! The method set mirrors a browser's bookmark and tab-group APIs. Tab
//! operations that touch several tabs take a list and count as one call.

use async_trait::async_trait;

use prwatch_core::types::{BookmarkId, BookmarkNode, GroupId, Tab, TabGroup, TabId};

use crate::error::SurfaceError;

#[async_trait]
pub trait BookmarkSurface: Send + Sync {
    /// Every node (folder or bookmark) whose title equals `title` exactly.
    async fn search_by_title(&self, title: &str) -> Result<Vec<BookmarkNode>, SurfaceError>;

    /// Create a folder under `parent`, at `index` among its children or last.
    async fn create_folder(
        &self,
        parent: &BookmarkId,
        title: &str,
        index: Option<usize>,
    ) -> Result<BookmarkNode, SurfaceError>;

    /// Direct children of `folder`, in display order.
    async fn children(&self, folder: &BookmarkId) -> Result<Vec<BookmarkNode>, SurfaceError>;

    async fn create_bookmark(
        &self,
        parent: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<BookmarkNode, SurfaceError>;

    /// Remove a bookmark or an empty folder.
    async fn remove(&self, id: &BookmarkId) -> Result<(), SurfaceError>;
}

#[async_trait]
pub trait TabSurface: Send + Sync {
    /// `Ok(None)` when no group with that id exists (any more).
    async fn get_group(&self, id: GroupId) -> Result<Option<TabGroup>, SurfaceError>;

    async fn tabs_in_group(&self, id: GroupId) -> Result<Vec<Tab>, SurfaceError>;

    /// Open one tab; `active: false` opens it in the background.
    async fn create_tab(&self, url: &str, active: bool) -> Result<Tab, SurfaceError>;

    /// Close every listed tab in one call.
    async fn remove_tabs(&self, ids: &[TabId]) -> Result<(), SurfaceError>;

    /// Form a new group from the listed tabs and return its id.
    async fn create_group(&self, tabs: &[TabId]) -> Result<GroupId, SurfaceError>;

    /// Move the listed tabs into an existing group in one call.
    async fn add_to_group(&self, group: GroupId, tabs: &[TabId]) -> Result<(), SurfaceError>;

    async fn update_group(
        &self,
        group: GroupId,
        title: &str,
        collapsed: bool,
    ) -> Result<(), SurfaceError>;
}
