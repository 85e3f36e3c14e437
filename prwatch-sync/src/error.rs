//! Error types for prwatch-sync.

use std::path::PathBuf;

use thiserror::Error;

use prwatch_core::types::{BookmarkId, GroupId, TabId};
use prwatch_core::StoreError;
use prwatch_github::FetchError;

/// Failures reported by a bookmark or tab surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Browser-state document could not be (de)serialized.
    #[error("browser state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no bookmark node with id {0}")]
    UnknownBookmark(BookmarkId),

    #[error("bookmark node {0} is not a folder")]
    NotAFolder(BookmarkId),

    #[error("bookmark folder {0} is not empty")]
    FolderNotEmpty(BookmarkId),

    #[error("no tab with id {0}")]
    UnknownTab(TabId),

    #[error("no tab group with id {0}")]
    UnknownGroup(GroupId),

    #[error("cannot group an empty list of tabs")]
    EmptyGroup,
}

/// All errors that can end a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Settings or state could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Identity lookup failed; nothing was fetched or reconciled.
    #[error("failed to get current user: {0}")]
    Identity(#[source] FetchError),

    /// The credential was rejected mid-cycle.
    #[error("failed to fetch pull requests for {repository}: {source}")]
    RepositoryAuth {
        repository: String,
        #[source]
        source: FetchError,
    },

    /// A bookmark or tab surface call failed.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Convenience constructor for [`SurfaceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SurfaceError {
    SurfaceError::Io {
        path: path.into(),
        source,
    }
}
