//! # prwatch-github
//!
//! Item fetcher for GitHub pull requests.
//!
//! [`ItemSource`] is the provider seam consumed by the sync pipeline;
//! [`GitHubClient`] implements it over the REST API. [`fetch_relevant`] narrows
//! a repository's open items to the ones involving the current user.

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::GitHubClient;
pub use error::FetchError;
pub use fetcher::{fetch_relevant, filter_relevant, ItemSource};
