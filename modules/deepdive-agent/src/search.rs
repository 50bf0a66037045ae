use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::traits::WebSearcher;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const REQUEST_COUNT: u32 = 10;
const MAX_RESULTS: usize = 7;
const NO_RESULTS: &str = "No results found.";

// --- Brave Web Search ---

pub struct BraveSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, serde::Deserialize)]
struct BraveResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

enum SearchFailure {
    Status {
        code: u16,
        reason: String,
        body: String,
    },
    Other(anyhow::Error),
}

impl SearchFailure {
    fn into_message(self) -> String {
        match self {
            SearchFailure::Status { code, reason, body } => {
                let body: String = body.chars().take(200).collect();
                format!("Error: Web search failed ({code}). {reason}. {body}")
            }
            SearchFailure::Other(e) => format!("Error: Web search failed. {e:#}"),
        }
    }
}

impl BraveSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
        })
    }

    async fn fetch_results(&self, query: &str) -> Result<Vec<SearchResult>, SearchFailure> {
        let count = REQUEST_COUNT.to_string();
        let resp = self
            .client
            .get(BRAVE_SEARCH_URL)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .context("Brave API request failed")
            .map_err(SearchFailure::Other)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchFailure::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        let data: BraveResponse = resp
            .json()
            .await
            .context("Failed to parse Brave response")
            .map_err(SearchFailure::Other)?;

        Ok(data
            .web
            .unwrap_or_default()
            .results
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
            })
            .collect())
    }
}

#[async_trait]
impl WebSearcher for BraveSearcher {
    async fn search(&self, query: &str) -> String {
        info!(query, "Brave search");
        match self.fetch_results(query).await {
            Ok(results) => {
                let text = format_results(&results);
                info!(query, count = results.len(), "Brave search complete");
                text
            }
            Err(failure) => {
                let message = failure.into_message();
                warn!(query, error = message.as_str(), "Brave search failed");
                message
            }
        }
    }
}

/// Render results as `Title/URL/Snippet` blocks separated by `---` lines.
/// Results with a blank URL are skipped and at most seven are kept.
pub fn format_results(results: &[SearchResult]) -> String {
    let blocks: Vec<String> = results
        .iter()
        .filter(|r| !r.url.trim().is_empty())
        .take(MAX_RESULTS)
        .map(|r| {
            let title = if r.title.trim().is_empty() {
                "Untitled"
            } else {
                r.title.as_str()
            };
            format!("Title: {title}\nURL: {}\nSnippet: {}", r.url, r.snippet)
        })
        .collect();

    if blocks.is_empty() {
        NO_RESULTS.to_string()
    } else {
        blocks.join("\n---\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, title: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            snippet: format!("about {title}"),
        }
    }

    #[test]
    fn formats_blocks_with_separator() {
        let text = format_results(&[
            result("https://a.com/x", "A"),
            result("https://b.org/y", ""),
        ]);
        assert_eq!(
            text,
            "Title: A\nURL: https://a.com/x\nSnippet: about A\n---\n\
             Title: Untitled\nURL: https://b.org/y\nSnippet: about "
        );
    }

    #[test]
    fn skips_blank_urls_and_caps_at_seven() {
        let mut results = vec![result("  ", "blank")];
        for i in 0..10 {
            results.push(result(&format!("https://site{i}.com"), "t"));
        }
        let text = format_results(&results);
        assert_eq!(text.matches("URL: ").count(), 7);
        assert!(!text.contains("blank"));
        assert!(text.contains("https://site6.com"));
        assert!(!text.contains("https://site7.com"));
    }

    #[test]
    fn empty_results_say_so() {
        assert_eq!(format_results(&[]), "No results found.");
        assert_eq!(format_results(&[result("", "x")]), "No results found.");
    }

    #[test]
    fn status_failure_message_truncates_body() {
        let msg = SearchFailure::Status {
            code: 429,
            reason: "Too Many Requests".into(),
            body: "x".repeat(500),
        }
        .into_message();
        assert!(msg.starts_with("Error: Web search failed (429). Too Many Requests. "));
        assert_eq!(msg.matches('x').count(), 200);
    }

    #[test]
    fn brave_payload_without_web_section_is_empty() {
        let data: BraveResponse = serde_json::from_str(r#"{"type":"search"}"#).unwrap();
        assert!(data.web.is_none());

        let data: BraveResponse = serde_json::from_str(
            r#"{"web":{"results":[{"url":"https://a.com","title":"A","description":"d"}]}}"#,
        )
        .unwrap();
        assert_eq!(data.web.unwrap().results[0].description, "d");
    }
}
