use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, socket protocol and in-process runs.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] prwatch_core::StoreError),

    #[error("{0}")]
    Sync(#[from] prwatch_sync::SyncError),

    #[error("connection failed: {0}")]
    Connection(#[from] prwatch_github::FetchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no GitHub token configured")]
    NoCredential,

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
