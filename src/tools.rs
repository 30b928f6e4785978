//! Web search tools for the tool router.
//!
//! - **[`DuckDuckGoTool`]**: DuckDuckGo Instant Answer API (no key needed).
//!   Returns the abstract, when there is one, followed by related topics.
//! - **[`WikipediaTool`]**: MediaWiki search with plain-text intro extracts
//!   of the top pages.
//!
//! Both speak plain HTTP GET with query parameters and accept a base URL
//! override so tests can point them at a local server.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use docqa_core::error::RagError;
use docqa_core::models::preview;
use docqa_core::router::{SearchTool, QUERY_ECHO_CHARS};

const DDG_API_URL: &str = "https://api.duckduckgo.com/";
const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = concat!("docqa/", env!("CARGO_PKG_VERSION"));

/// Characters of Wikipedia text kept across all pages.
pub const WIKIPEDIA_MAX_CHARS: usize = 2000;

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

// ============ DuckDuckGo ============

pub struct DuckDuckGoTool {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl DuckDuckGoTool {
    pub fn new(timeout: Duration, max_results: usize) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: DDG_API_URL.to_string(),
            max_results: max_results.max(1),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct DdgResponse {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

#[derive(Debug, Deserialize)]
struct DdgTopic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

fn format_ddg(response: DdgResponse, limit: usize) -> String {
    let mut lines = Vec::new();

    if !response.abstract_text.is_empty() {
        lines.push(format!(
            "{}: {} ({})",
            response.heading, response.abstract_text, response.abstract_url
        ));
    }

    // Disambiguation groups carry no Text of their own and are skipped.
    for topic in response.related_topics {
        if lines.len() >= limit {
            break;
        }
        if let Some(text) = topic.text {
            match topic.first_url {
                Some(url) => lines.push(format!("- {} ({})", text, url)),
                None => lines.push(format!("- {}", text)),
            }
        }
    }

    if lines.is_empty() {
        "No instant answer available.".to_string()
    } else {
        lines.join("\n")
    }
}

#[async_trait]
impl SearchTool for DuckDuckGoTool {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn label(&self) -> &str {
        "DuckDuckGo"
    }

    async fn invoke(&self, query: &str) -> Result<String> {
        debug!(query, "DuckDuckGo request");
        let response: DdgResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid DuckDuckGo response")?;

        Ok(format_ddg(response, self.max_results))
    }

    fn fallback(&self, query: &str, err: &RagError) -> String {
        let q = preview(query, QUERY_ECHO_CHARS);
        format!(
            "{} search failed: {}\n\nFallback results:\n- Information about {}\n- Documentation on {}",
            self.label(),
            err,
            q,
            q
        )
    }
}

// ============ Wikipedia ============

pub struct WikipediaTool {
    client: reqwest::Client,
    base_url: String,
    max_pages: usize,
}

impl WikipediaTool {
    pub fn new(timeout: Duration, max_pages: usize) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: WIKIPEDIA_API_URL.to_string(),
            max_pages: max_pages.clamp(1, 3),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WikiResponse {
    #[serde(default)]
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    pages: std::collections::HashMap<String, WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: String,
    /// Search rank, 1-based.
    #[serde(default)]
    index: usize,
    #[serde(default)]
    extract: String,
}

fn format_wikipedia(response: WikiResponse) -> String {
    let mut pages: Vec<WikiPage> = response
        .query
        .map(|q| q.pages.into_values().collect())
        .unwrap_or_default();
    pages.sort_by_key(|p| p.index);

    let text = pages
        .iter()
        .filter(|p| !p.extract.trim().is_empty())
        .map(|p| format!("Page: {}\nSummary: {}", p.title, p.extract.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.is_empty() {
        "No good Wikipedia Search Result was found".to_string()
    } else {
        text.chars().take(WIKIPEDIA_MAX_CHARS).collect()
    }
}

#[async_trait]
impl SearchTool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn label(&self) -> &str {
        "Wikipedia"
    }

    async fn invoke(&self, query: &str) -> Result<String> {
        debug!(query, "Wikipedia request");
        let limit = self.max_pages.to_string();
        let response: WikiResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exlimit", limit.as_str()),
                ("redirects", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid Wikipedia response")?;

        Ok(format_wikipedia(response))
    }

    fn fallback(&self, query: &str, err: &RagError) -> String {
        format!(
            "{} search failed: {}\n\nFallback: No Wikipedia results for {}",
            self.label(),
            err,
            preview(query, QUERY_ECHO_CHARS)
        )
    }
}
