//! GitHub REST client.
//!
//! Requests are blocking `ureq` calls moved onto tokio's blocking pool, so the
//! async [`ItemSource`] methods never stall the runtime.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use prwatch_core::types::{ItemKey, RemoteItem, RepoSlug, Token, Username};

use crate::error::FetchError;
use crate::fetcher::ItemSource;

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("prwatch/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest page the API serves; pagination beyond it is not followed.
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn current_user_blocking(&self, token: &Token) -> Result<Username, FetchError> {
        let user: UserPayload = self.get_json(token, "/user")?;
        Ok(Username(user.login))
    }

    fn open_items_blocking(
        &self,
        token: &Token,
        repository: &RepoSlug,
    ) -> Result<Vec<RemoteItem>, FetchError> {
        let path = format!(
            "/repos/{}/{}/pulls?state=open&per_page={PAGE_SIZE}",
            repository.owner(),
            repository.name()
        );
        let pulls: Vec<PullRequestPayload> = self.get_json(token, &path)?;
        Ok(pulls
            .into_iter()
            .map(|pull| pull.into_item(repository))
            .collect())
    }

    fn get_json<T: DeserializeOwned>(&self, token: &Token, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &format!("token {}", token.expose()))
            .set("Accept", ACCEPT)
            .call();

        match response {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|e| FetchError::Decode(e.to_string())),
            Err(ureq::Error::Status(status, _)) => Err(FetchError::from_status(status)),
            Err(ureq::Error::Transport(transport)) => {
                Err(FetchError::Transport(transport.to_string()))
            }
        }
    }
}

#[async_trait]
impl ItemSource for GitHubClient {
    async fn current_user(&self, token: &Token) -> Result<Username, FetchError> {
        let client = self.clone();
        let token = token.clone();
        tokio::task::spawn_blocking(move || client.current_user_blocking(&token))
            .await
            .map_err(|e| FetchError::Transport(format!("request task failed: {e}")))?
    }

    async fn open_items(
        &self,
        token: &Token,
        repository: &RepoSlug,
    ) -> Result<Vec<RemoteItem>, FetchError> {
        let client = self.clone();
        let token = token.clone();
        let repository = repository.clone();
        tokio::task::spawn_blocking(move || client.open_items_blocking(&token, &repository))
            .await
            .map_err(|e| FetchError::Transport(format!("request task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    html_url: String,
    title: String,
    user: Option<UserPayload>,
    #[serde(default)]
    requested_reviewers: Vec<UserPayload>,
}

impl PullRequestPayload {
    fn into_item(self, repository: &RepoSlug) -> RemoteItem {
        RemoteItem {
            key: ItemKey(self.html_url),
            title: self.title,
            repository: repository.clone(),
            number: self.number,
            author: self.user.map(|u| Username(u.login)),
            requested_reviewers: self
                .requested_reviewers
                .into_iter()
                .map(|u| Username(u.login))
                .collect(),
        }
    }
}
