//! File-backed browser state: a bookmark tree plus tabs and tab groups.
//!
//! Persists a [`BrowserState`] JSON document at `<home>/.prwatch/browser.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the settings store.
//!
//! Semantics follow the browser APIs the reconcilers were designed against:
//! bookmark ids are strings with `"1"` as the bookmarks bar, folders have no
//! URL, and a tab group exists only while at least one tab belongs to it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prwatch_core::store::prwatch_root;
use prwatch_core::types::{BookmarkId, BookmarkNode, GroupId, Tab, TabGroup, TabId};

use crate::error::{io_err, SurfaceError};
use crate::surface::{BookmarkSurface, TabSurface};

pub const BROWSER_STATE_FILE: &str = "browser.json";

const FIRST_ALLOCATED_ID: u64 = 100;

/// `~/.prwatch/browser.json`
pub fn browser_state_path_at(home: &Path) -> PathBuf {
    prwatch_root(home).join(BROWSER_STATE_FILE)
}

// ---------------------------------------------------------------------------
// In-memory model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserState {
    next_id: u64,
    #[serde(default)]
    pub bookmarks: Vec<BookmarkNode>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub groups: Vec<TabGroup>,
}

impl Default for BrowserState {
    fn default() -> Self {
        Self {
            next_id: FIRST_ALLOCATED_ID,
            bookmarks: vec![BookmarkNode {
                id: BookmarkId::bookmarks_bar(),
                parent_id: None,
                title: "Bookmarks bar".to_string(),
                url: None,
            }],
            tabs: vec![],
            groups: vec![],
        }
    }
}

impl BrowserState {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn node(&self, id: &BookmarkId) -> Result<&BookmarkNode, SurfaceError> {
        self.bookmarks
            .iter()
            .find(|n| &n.id == id)
            .ok_or_else(|| SurfaceError::UnknownBookmark(id.clone()))
    }

    fn folder(&self, id: &BookmarkId) -> Result<&BookmarkNode, SurfaceError> {
        let node = self.node(id)?;
        if !node.is_folder() {
            return Err(SurfaceError::NotAFolder(id.clone()));
        }
        Ok(node)
    }

    pub fn search_by_title(&self, title: &str) -> Vec<BookmarkNode> {
        self.bookmarks
            .iter()
            .filter(|n| n.title == title)
            .cloned()
            .collect()
    }

    pub fn children(&self, folder: &BookmarkId) -> Result<Vec<BookmarkNode>, SurfaceError> {
        self.folder(folder)?;
        Ok(self
            .bookmarks
            .iter()
            .filter(|n| n.parent_id.as_ref() == Some(folder))
            .cloned()
            .collect())
    }

    fn insert_child(
        &mut self,
        parent: &BookmarkId,
        title: &str,
        url: Option<&str>,
        index: Option<usize>,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.folder(parent)?;
        let node = BookmarkNode {
            id: BookmarkId(self.allocate().to_string()),
            parent_id: Some(parent.clone()),
            title: title.to_string(),
            url: url.map(str::to_string),
        };
        let siblings: Vec<usize> = self
            .bookmarks
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent_id.as_ref() == Some(parent))
            .map(|(pos, _)| pos)
            .collect();
        let pos = match index {
            Some(i) if i < siblings.len() => siblings[i],
            _ => self.bookmarks.len(),
        };
        self.bookmarks.insert(pos, node.clone());
        Ok(node)
    }

    pub fn create_folder(
        &mut self,
        parent: &BookmarkId,
        title: &str,
        index: Option<usize>,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.insert_child(parent, title, None, index)
    }

    pub fn create_bookmark(
        &mut self,
        parent: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.insert_child(parent, title, Some(url), None)
    }

    pub fn remove_bookmark(&mut self, id: &BookmarkId) -> Result<(), SurfaceError> {
        let node = self.node(id)?;
        if node.is_folder()
            && self
                .bookmarks
                .iter()
                .any(|n| n.parent_id.as_ref() == Some(id))
        {
            return Err(SurfaceError::FolderNotEmpty(id.clone()));
        }
        self.bookmarks.retain(|n| &n.id != id);
        Ok(())
    }

    pub fn get_group(&self, id: GroupId) -> Option<TabGroup> {
        self.groups.iter().find(|g| g.id == id).cloned()
    }

    pub fn tabs_in_group(&self, id: GroupId) -> Result<Vec<Tab>, SurfaceError> {
        if self.get_group(id).is_none() {
            return Err(SurfaceError::UnknownGroup(id));
        }
        Ok(self
            .tabs
            .iter()
            .filter(|t| t.group_id == Some(id))
            .cloned()
            .collect())
    }

    pub fn create_tab(&mut self, url: &str, active: bool) -> Tab {
        if active {
            for tab in &mut self.tabs {
                tab.active = false;
            }
        }
        let tab = Tab {
            id: TabId(self.allocate()),
            url: Some(url.to_string()),
            active,
            group_id: None,
        };
        self.tabs.push(tab.clone());
        tab
    }

    fn check_tabs(&self, ids: &[TabId]) -> Result<(), SurfaceError> {
        let known: HashSet<TabId> = self.tabs.iter().map(|t| t.id).collect();
        match ids.iter().find(|id| !known.contains(id)) {
            Some(missing) => Err(SurfaceError::UnknownTab(*missing)),
            None => Ok(()),
        }
    }

    /// All-or-nothing: an unknown id fails the call before anything closes.
    pub fn remove_tabs(&mut self, ids: &[TabId]) -> Result<(), SurfaceError> {
        self.check_tabs(ids)?;
        let doomed: HashSet<TabId> = ids.iter().copied().collect();
        self.tabs.retain(|t| !doomed.contains(&t.id));
        self.prune_empty_groups();
        Ok(())
    }

    pub fn create_group(&mut self, ids: &[TabId]) -> Result<GroupId, SurfaceError> {
        if ids.is_empty() {
            return Err(SurfaceError::EmptyGroup);
        }
        self.check_tabs(ids)?;
        let group = GroupId(self.allocate());
        self.groups.push(TabGroup {
            id: group,
            title: String::new(),
            collapsed: false,
        });
        self.assign(group, ids);
        Ok(group)
    }

    pub fn add_to_group(&mut self, group: GroupId, ids: &[TabId]) -> Result<(), SurfaceError> {
        if self.get_group(group).is_none() {
            return Err(SurfaceError::UnknownGroup(group));
        }
        self.check_tabs(ids)?;
        self.assign(group, ids);
        Ok(())
    }

    pub fn update_group(
        &mut self,
        group: GroupId,
        title: &str,
        collapsed: bool,
    ) -> Result<(), SurfaceError> {
        let entry = self
            .groups
            .iter_mut()
            .find(|g| g.id == group)
            .ok_or(SurfaceError::UnknownGroup(group))?;
        entry.title = title.to_string();
        entry.collapsed = collapsed;
        Ok(())
    }

    /// Ungroup every tab of `group`, dissolving it, as a user would.
    pub fn ungroup(&mut self, group: GroupId) {
        for tab in &mut self.tabs {
            if tab.group_id == Some(group) {
                tab.group_id = None;
            }
        }
        self.prune_empty_groups();
    }

    fn assign(&mut self, group: GroupId, ids: &[TabId]) {
        let moving: HashSet<TabId> = ids.iter().copied().collect();
        for tab in &mut self.tabs {
            if moving.contains(&tab.id) {
                tab.group_id = Some(group);
            }
        }
        self.prune_empty_groups();
    }

    fn prune_empty_groups(&mut self) {
        let tabs = &self.tabs;
        self.groups
            .retain(|g| tabs.iter().any(|t| t.group_id == Some(g.id)));
    }
}

// ---------------------------------------------------------------------------
// File-backed surface
// ---------------------------------------------------------------------------

/// [`BookmarkSurface`] + [`TabSurface`] persisted to one JSON document.
///
/// Every call is a load → mutate → atomic save, serialized by an internal
/// mutex so concurrent calls from one process never lose an update.
#[derive(Debug)]
pub struct FileSurface {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Surface stored at `<home>/.prwatch/browser.json`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(browser_state_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing file is an empty browser.
    pub fn load(&self) -> Result<BrowserState, SurfaceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BrowserState::default()),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    fn save(&self, state: &BrowserState) -> Result<(), SurfaceError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&BrowserState) -> Result<T, SurfaceError>,
    ) -> Result<T, SurfaceError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        f(&self.load()?)
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut BrowserState) -> Result<T, SurfaceError>,
    ) -> Result<T, SurfaceError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}

#[async_trait]
impl BookmarkSurface for FileSurface {
    async fn search_by_title(&self, title: &str) -> Result<Vec<BookmarkNode>, SurfaceError> {
        self.read(|s| Ok(s.search_by_title(title)))
    }

    async fn create_folder(
        &self,
        parent: &BookmarkId,
        title: &str,
        index: Option<usize>,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.update(|s| s.create_folder(parent, title, index))
    }

    async fn children(&self, folder: &BookmarkId) -> Result<Vec<BookmarkNode>, SurfaceError> {
        self.read(|s| s.children(folder))
    }

    async fn create_bookmark(
        &self,
        parent: &BookmarkId,
        title: &str,
        url: &str,
    ) -> Result<BookmarkNode, SurfaceError> {
        self.update(|s| s.create_bookmark(parent, title, url))
    }

    async fn remove(&self, id: &BookmarkId) -> Result<(), SurfaceError> {
        self.update(|s| s.remove_bookmark(id))
    }
}

#[async_trait]
impl TabSurface for FileSurface {
    async fn get_group(&self, id: GroupId) -> Result<Option<TabGroup>, SurfaceError> {
        self.read(|s| Ok(s.get_group(id)))
    }

    async fn tabs_in_group(&self, id: GroupId) -> Result<Vec<Tab>, SurfaceError> {
        self.read(|s| s.tabs_in_group(id))
    }

    async fn create_tab(&self, url: &str, active: bool) -> Result<Tab, SurfaceError> {
        self.update(|s| Ok(s.create_tab(url, active)))
    }

    async fn remove_tabs(&self, ids: &[TabId]) -> Result<(), SurfaceError> {
        self.update(|s| s.remove_tabs(ids))
    }

    async fn create_group(&self, tabs: &[TabId]) -> Result<GroupId, SurfaceError> {
        self.update(|s| s.create_group(tabs))
    }

    async fn add_to_group(&self, group: GroupId, tabs: &[TabId]) -> Result<(), SurfaceError> {
        self.update(|s| s.add_to_group(group, tabs))
    }

    async fn update_group(
        &self,
        group: GroupId,
        title: &str,
        collapsed: bool,
    ) -> Result<(), SurfaceError> {
        self.update(|s| s.update_group(group, title, collapsed))
    }
}
