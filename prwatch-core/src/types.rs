//! Domain types shared by the fetcher, the reconcilers and the daemon.
//!
//! Identifiers are newtypes so a tab id can never be passed where a group id
//! is expected. Everything persisted is serializable via serde.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A provider login name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Username(pub String);

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable identity of a remote item: its canonical web URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey(pub String);

impl ItemKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque bearer credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First four characters followed by an ellipsis, for display.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Bookmark node id. Bookmark trees use string ids; `"1"` is the bookmarks bar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookmarkId(pub String);

impl BookmarkId {
    pub fn bookmarks_bar() -> Self {
        Self("1".to_owned())
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BookmarkId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Repository slug
// ---------------------------------------------------------------------------

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("static slug regex"));

/// A configured `owner/name` repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoSlug {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !SLUG_PATTERN.is_match(trimmed) {
            return Err(StoreError::InvalidRepository(s.to_owned()));
        }
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| StoreError::InvalidRepository(s.to_owned()))?;
        Ok(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.to_string()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Remote items and the target set
// ---------------------------------------------------------------------------

/// One open change request as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub key: ItemKey,
    pub title: String,
    pub repository: RepoSlug,
    pub number: u64,
    /// `None` when the provider reports no author (deleted account).
    pub author: Option<Username>,
    #[serde(default)]
    pub requested_reviewers: Vec<Username>,
}

impl RemoteItem {
    /// True when `user` authored the item or is a requested reviewer on it.
    pub fn involves(&self, user: &Username) -> bool {
        self.author.as_ref() == Some(user) || self.requested_reviewers.contains(user)
    }
}

/// Items that should be mirrored this cycle, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet(BTreeMap<ItemKey, RemoteItem>);

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item; a later item with the same key replaces the earlier one.
    pub fn insert(&mut self, item: RemoteItem) {
        self.0.insert(item.key.clone(), item);
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &ItemKey) -> Option<&RemoteItem> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RemoteItem> for TargetSet {
    fn from_iter<I: IntoIterator<Item = RemoteItem>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl Extend<RemoteItem> for TargetSet {
    fn extend<I: IntoIterator<Item = RemoteItem>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

// ---------------------------------------------------------------------------
// Local surface entries
// ---------------------------------------------------------------------------

/// A node of the bookmark tree. Folders have no URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkNode {
    pub id: BookmarkId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BookmarkId>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// An open tab. `url` may be absent while a tab is still loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabGroup {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub collapsed: bool,
}

// ---------------------------------------------------------------------------
// Persisted settings and state
// ---------------------------------------------------------------------------

pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;
pub const DEFAULT_FOLDER_TITLE: &str = "Pull Requests";
pub const DEFAULT_GROUP_TITLE: &str = "Pull Requests";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-edited configuration (`config.yaml`).
///
/// Repositories are kept as raw strings so a single malformed entry does not
/// make the whole file unreadable; they are parsed when a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
    #[serde(default = "default_folder_title")]
    pub bookmark_folder: String,
    #[serde(default = "default_group_title")]
    pub tab_group: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            repositories: vec![],
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            bookmark_folder: default_folder_title(),
            tab_group: default_group_title(),
            api_base: default_api_base(),
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_folder_title() -> String {
    DEFAULT_FOLDER_TITLE.to_owned()
}

fn default_group_title() -> String {
    DEFAULT_GROUP_TITLE.to_owned()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_owned()
}

/// Machine-written state (`state.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
