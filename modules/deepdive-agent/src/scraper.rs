use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use deepdive_common::DeepdiveError;

use crate::traits::ContentFetcher;

/// Extracted page text is cut to this many characters.
pub const MAX_CONTENT_CHARS: usize = 6000;

// --- Plain HTTP + Readability scraper ---

pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; deepdive/0.1)")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(DeepdiveError::Scraping(format!(
                "unsupported scheme '{}' for {url}",
                parsed.scheme()
            )));
        }

        info!(url, scraper = "http", "Scraping URL");

        let resp = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .context("Page request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!(DeepdiveError::Scraping(format!("{url} returned {status}")));
        }

        let is_text = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/") || ct.contains("html") || ct.contains("xml"))
            .unwrap_or(true);
        if !is_text {
            warn!(url, scraper = "http", "Skipping non-text content");
            return Ok(String::new());
        }

        let html = resp.text().await.context("Failed to read page body")?;
        if html.is_empty() {
            warn!(url, scraper = "http", "Empty HTML response");
            return Ok(String::new());
        }

        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Text,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: Some(&parsed),
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let text = clean_text(&transform_content_input(input, &config));
        if text.is_empty() {
            warn!(url, scraper = "http", "Empty content after extraction");
        } else {
            info!(url, scraper = "http", bytes = text.len(), "Scrape complete");
        }
        Ok(text)
    }
}

/// Collapse whitespace runs to single spaces and cap the length.
pub fn clean_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((idx, _)) => collapsed[..idx].to_string(),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(clean_text(" \n "), "");
    }

    #[test]
    fn clean_text_caps_on_char_boundary() {
        let long = "é".repeat(MAX_CONTENT_CHARS + 50);
        let cleaned = clean_text(&long);
        assert_eq!(cleaned.chars().count(), MAX_CONTENT_CHARS);
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let scraper = HttpScraper::new().unwrap();
        let err = scraper.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
