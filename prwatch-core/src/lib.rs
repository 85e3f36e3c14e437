//! prwatch core library: domain types, settings/state persistence, errors.
//!
//! - [`types`]: newtypes, remote items, target set, surface entries
//! - [`error`]: [`StoreError`]
//! - [`store`]: config/state files and the [`StateStore`] seam

pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{FileStore, MemoryStore, StateStore};
pub use types::{
    BookmarkId, BookmarkNode, GroupId, ItemKey, RemoteItem, RepoSlug, Settings, SyncState, Tab,
    TabGroup, TabId, TargetSet, Token, Username,
};
