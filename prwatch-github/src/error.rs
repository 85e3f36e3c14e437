//! Error taxonomy for provider calls.

use thiserror::Error;

/// Failure of a single provider request.
///
/// Only [`FetchError::Auth`] is fatal to a whole cycle; everything else is
/// scoped to the repository being fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 401: the credential was rejected.
    #[error("invalid GitHub token")]
    Auth,

    /// 403: rate limited or missing scope.
    #[error("rate limit exceeded or insufficient permissions")]
    Access,

    /// 404: repository missing, misnamed, or invisible to this token.
    #[error("repository not found or no access")]
    NotFound,

    #[error("unexpected response status {status}")]
    Unknown { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Map a non-2xx HTTP status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FetchError::Auth,
            403 => FetchError::Access,
            404 => FetchError::NotFound,
            status => FetchError::Unknown { status },
        }
    }

    /// True when every later call with the same credential will fail too.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth)
    }
}
