//! Provider seam and the author/reviewer filter.

use async_trait::async_trait;

use prwatch_core::types::{RemoteItem, RepoSlug, Token, Username};

use crate::error::FetchError;

/// Read operations the sync pipeline needs from a source-control provider.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Identity the credential belongs to.
    async fn current_user(&self, token: &Token) -> Result<Username, FetchError>;

    /// Every open item of `repository`, unfiltered.
    async fn open_items(
        &self,
        token: &Token,
        repository: &RepoSlug,
    ) -> Result<Vec<RemoteItem>, FetchError>;
}

/// Fetch the open items of one repository that involve `username`.
///
/// No retry: a failure is returned as-is and the next cycle tries again.
pub async fn fetch_relevant(
    source: &dyn ItemSource,
    token: &Token,
    repository: &RepoSlug,
    username: &Username,
) -> Result<Vec<RemoteItem>, FetchError> {
    let items = source.open_items(token, repository).await?;
    let total = items.len();
    let relevant = filter_relevant(items, username);
    tracing::debug!(
        repository = %repository,
        total,
        relevant = relevant.len(),
        "filtered open items",
    );
    Ok(relevant)
}

/// Keep items authored by `username` or with `username` as requested reviewer.
pub fn filter_relevant(items: Vec<RemoteItem>, username: &Username) -> Vec<RemoteItem> {
    items
        .into_iter()
        .filter(|item| item.involves(username))
        .collect()
}
