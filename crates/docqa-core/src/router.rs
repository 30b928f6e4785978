//! Tool routing for the tool-routed workflow.
//!
//! A [`SearchTool`] fetches text for a query from some source: the local
//! document store ([`RagSearchTool`]) or a web service (implemented in the
//! app crate). The [`ToolRouter`] picks one per request and guarantees that
//! a failing or slow tool degrades to labeled fallback text instead of an
//! error.
//!
//! | `connected` | `tool`            | Route              |
//! |-------------|-------------------|--------------------|
//! | `false`     | any               | direct (no tool)   |
//! | `true`      | registered name   | that tool          |
//! | `true`      | unknown or absent | the default tool   |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::RagError;
use crate::models::preview;
use crate::retriever::Retriever;

/// Longest echo of the query in headers and fallbacks, in characters.
pub const QUERY_ECHO_CHARS: usize = 200;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Routing key, e.g. `"wikipedia"`.
    fn name(&self) -> &str;

    /// Human-readable provenance label, e.g. `"Wikipedia"`.
    fn label(&self) -> &str;

    async fn invoke(&self, query: &str) -> Result<String>;

    /// Text returned in place of results when [`invoke`](Self::invoke)
    /// fails or times out.
    fn fallback(&self, query: &str, err: &RagError) -> String {
        format!(
            "{} search failed: {}\n\nFallback: No results for '{}'",
            self.label(),
            err,
            preview(query, QUERY_ECHO_CHARS)
        )
    }
}

/// What the router produced for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Name of the tool used; `None` on the direct route.
    pub tool: Option<String>,
    pub text: String,
    pub fallback: bool,
}

pub struct ToolRouter {
    tools: Vec<Arc<dyn SearchTool>>,
    default_tool: String,
    timeout: Duration,
}

impl ToolRouter {
    pub fn new(default_tool: impl Into<String>) -> Self {
        Self {
            tools: Vec::new(),
            default_tool: default_tool.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Register a tool. A later registration with the same name wins.
    pub fn with_tool(mut self, tool: Arc<dyn SearchTool>) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn SearchTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Pick the tool for a request, or `None` for the direct route.
    pub fn select(&self, connected: bool, tool: Option<&str>) -> Option<Arc<dyn SearchTool>> {
        if !connected {
            return None;
        }
        if let Some(found) = tool.and_then(|name| self.find(name)) {
            return Some(found.clone());
        }
        if let Some(name) = tool {
            debug!(tool = name, default = %self.default_tool, "unknown tool, using default");
        }
        let selected = self.find(&self.default_tool).cloned();
        if selected.is_none() {
            warn!(default = %self.default_tool, "default tool not registered, routing direct");
        }
        selected
    }

    /// Route `query` and return the text handed on to synthesis.
    ///
    /// Never fails: tool errors and timeouts become the tool's fallback.
    pub async fn dispatch(&self, connected: bool, tool: Option<&str>, query: &str) -> ToolOutput {
        let Some(tool) = self.select(connected, tool) else {
            return ToolOutput {
                tool: None,
                text: query.to_string(),
                fallback: false,
            };
        };

        let err = match tokio::time::timeout(self.timeout, tool.invoke(query)).await {
            Ok(Ok(results)) => {
                return ToolOutput {
                    tool: Some(tool.name().to_string()),
                    text: format!(
                        "[{}] Results for '{}':\n\n{}",
                        tool.label(),
                        preview(query, QUERY_ECHO_CHARS),
                        results
                    ),
                    fallback: false,
                }
            }
            Ok(Err(e)) => RagError::ToolInvocation {
                tool: tool.name().to_string(),
                message: format!("{:#}", e),
            },
            Err(_) => RagError::ToolInvocation {
                tool: tool.name().to_string(),
                message: format!("timed out after {}s", self.timeout.as_secs()),
            },
        };

        warn!(tool = tool.name(), error = %err, "tool fell back");
        ToolOutput {
            tool: Some(tool.name().to_string()),
            text: tool.fallback(query, &err),
            fallback: true,
        }
    }
}

/// Vector search over the local document store.
pub struct RagSearchTool {
    retriever: Retriever,
}

impl RagSearchTool {
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl SearchTool for RagSearchTool {
    fn name(&self) -> &str {
        "rag"
    }

    fn label(&self) -> &str {
        "Documents"
    }

    async fn invoke(&self, query: &str) -> Result<String> {
        let hits = self.retriever.retrieve(query).await?;
        if hits.is_empty() {
            return Ok("No matching documents found.".to_string());
        }

        Ok(hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "{}. {}\n   Source: {} (page {})",
                    i + 1,
                    hit.content,
                    hit.metadata.source,
                    hit.metadata.page
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_store, FailingTool, SlowTool, StaticTool};

    fn router() -> ToolRouter {
        ToolRouter::new("duckduckgo")
            .with_tool(Arc::new(StaticTool::new("duckduckgo", "DuckDuckGo", "ddg says hi")))
            .with_tool(Arc::new(StaticTool::new("wikipedia", "Wikipedia", "wiki says hi")))
    }

    #[tokio::test]
    async fn test_disconnected_routes_direct() {
        let out = router().dispatch(false, Some("wikipedia"), "raw input").await;
        assert_eq!(out.tool, None);
        assert_eq!(out.text, "raw input");
        assert!(!out.fallback);
    }

    #[tokio::test]
    async fn test_named_tool_output_has_header() {
        let out = router().dispatch(true, Some("wikipedia"), "rust").await;
        assert_eq!(out.tool.as_deref(), Some("wikipedia"));
        assert_eq!(out.text, "[Wikipedia] Results for 'rust':\n\nwiki says hi");
    }

    #[tokio::test]
    async fn test_unknown_or_absent_tool_uses_default() {
        let r = router();
        assert_eq!(r.select(true, Some("bing")).unwrap().name(), "duckduckgo");
        assert_eq!(r.select(true, None).unwrap().name(), "duckduckgo");
        assert!(r.select(false, None).is_none());
    }

    #[tokio::test]
    async fn test_failure_becomes_fallback() {
        let r = ToolRouter::new("flaky").with_tool(Arc::new(FailingTool::new("flaky", "Flaky")));
        let out = r.dispatch(true, None, "some query").await;
        assert!(out.fallback);
        assert!(out.text.starts_with("Flaky search failed: "));
        assert!(out.text.contains("some query"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_fallback() {
        let r = ToolRouter::new("slow")
            .with_tool(Arc::new(SlowTool::new("slow", Duration::from_secs(5))))
            .with_timeout(Duration::from_millis(20));
        let out = r.dispatch(true, Some("slow"), "q").await;
        assert!(out.fallback);
        assert!(out.text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_fallback_truncates_long_query() {
        let r = ToolRouter::new("flaky").with_tool(Arc::new(FailingTool::new("flaky", "Flaky")));
        let query = "q".repeat(1000);
        let out = r.dispatch(true, None, &query).await;
        assert!(out.text.contains(&format!("{}...", "q".repeat(200))));
        assert!(!out.text.contains(&"q".repeat(201)));
    }

    #[tokio::test]
    async fn test_rag_tool_lists_hits() {
        let store = seeded_store(&[
            ("guide.txt", "Install with cargo install docqa."),
            ("faq.txt", "Uninstall by deleting the binary."),
        ])
        .await;
        let tool = RagSearchTool::new(Retriever::new(store, 5));
        let text = tool.invoke("install").await.unwrap();
        assert!(text.starts_with("1. "));
        assert!(text.contains("2. "));
        assert!(text.contains("Source: guide.txt (page 0)"));
    }

    #[tokio::test]
    async fn test_rag_tool_empty_store() {
        let store = seeded_store(&[]).await;
        let tool = RagSearchTool::new(Retriever::new(store, 5));
        assert_eq!(
            tool.invoke("anything").await.unwrap(),
            "No matching documents found."
        );
    }
}
