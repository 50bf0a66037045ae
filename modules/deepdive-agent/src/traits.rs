// Collaborator seams for the research loop.
//
// WebSearcher and ContentFetcher hide the network. Both fail soft: search
// reports failure in-band with an `Error:` prefix, fetch returns `Err` so
// the retry policy can act and the caller collapses the last error to
// "no content". MockSearcher and MockFetcher in `testing` implement them
// without any network.

use anyhow::Result;
use async_trait::async_trait;

/// Prefix a search provider uses to report failure in-band.
pub const SEARCH_ERROR_PREFIX: &str = "Error:";

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Run a search and return newline-delimited result blocks in which each
    /// result URL appears on its own `URL: <http(s)://...>` line. On failure
    /// the returned text starts with [`SEARCH_ERROR_PREFIX`].
    async fn search(&self, query: &str) -> String;
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch a page and return its extracted plain text. An empty string
    /// means the page had no usable text.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// True when a search response is an in-band failure signal.
pub fn is_search_error(results: &str) -> bool {
    results.starts_with(SEARCH_ERROR_PREFIX)
}
