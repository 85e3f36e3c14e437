//! Error types for prwatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from settings and state persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (state file write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parse error on load: includes the offending file path.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.prwatch/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A repository entry is not of the form `owner/name`.
    #[error("invalid repository '{0}': expected owner/name")]
    InvalidRepository(String),

    #[error("repository '{0}' is already configured")]
    DuplicateRepository(String),

    #[error("repository '{0}' is not configured")]
    UnknownRepository(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
