//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults, so a
//! minimal config is:
//!
//! ```toml
//! [db]
//! path = "./data/docqa.sqlite"
//! ```
//!
//! API keys are never read from the file; providers take them from the
//! environment (`OPENAI_API_KEY`), which `main` pre-populates from `.env`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docqa_core::chunk::ChunkConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub chunking: ChunkConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
        }
    }
}

fn default_collection_name() -> String {
    "documents".to_string()
}

/// File discovery for `docqa ingest <dir>`.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.docx".to_string(),
        "**/*.doc".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_conversation_k")]
    pub conversation_k: usize,
    #[serde(default = "default_tool_k")]
    pub tool_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            conversation_k: default_conversation_k(),
            tool_k: default_tool_k(),
        }
    }
}

fn default_conversation_k() -> usize {
    docqa_core::retriever::CONVERSATION_K
}
fn default_tool_k() -> usize {
    docqa_core::retriever::TOOL_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Overrides the built-in document QA system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub no_results_answer: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system_prompt: None,
            no_results_answer: None,
        }
    }
}

fn default_max_turns() -> usize {
    docqa_core::conversation::MAX_TURNS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible proxy or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            url: None,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    /// Tool used when a connected request names no known tool.
    #[serde(default = "default_tool")]
    pub default: String,
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on items listed per web search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default: default_tool(),
            timeout_secs: default_tool_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

fn default_tool() -> String {
    "duckduckgo".to_string()
}
fn default_tool_timeout_secs() -> u64 {
    15
}
fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Conversations kept in memory; the least recently used is dropped first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_max_sessions() -> usize {
    1000
}

pub const TOOL_NAMES: [&str; 3] = ["rag", "duckduckgo", "wikipedia"];

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!("chunking.overlap must be < chunking.chunk_size");
    }

    if config.retrieval.conversation_k == 0 || config.retrieval.tool_k == 0 {
        bail!("retrieval.conversation_k and retrieval.tool_k must be >= 1");
    }

    if config.conversation.max_turns == 0 || config.conversation.max_turns % 2 != 0 {
        bail!("conversation.max_turns must be a positive even number");
    }

    if config.collection.name.trim().is_empty() {
        bail!("collection.name must not be empty");
    }

    if config.server.max_sessions == 0 {
        bail!("server.max_sessions must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if !TOOL_NAMES.contains(&config.tools.default.as_str()) {
        bail!(
            "tools.default must be one of {}, got '{}'",
            TOOL_NAMES.join(", "),
            config.tools.default
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/docqa.sqlite\"\n").unwrap();
        assert_eq!(config.collection.name, "documents");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.conversation_k, 3);
        assert_eq!(config.retrieval.tool_k, 5);
        assert_eq!(config.conversation.max_turns, 20);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.tools.default, "duckduckgo");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.server.max_sessions, 1000);
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let err = parse(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\noverlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_openai_embedding_requires_model_and_dims() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_default_tool_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[tools]\ndefault = \"bing\"\n").unwrap_err();
        assert!(err.to_string().contains("tools.default"));
    }

    #[test]
    fn test_odd_max_turns_rejected() {
        assert!(parse("[db]\npath = \"x.sqlite\"\n[conversation]\nmax_turns = 5\n").is_err());
    }

    #[test]
    fn test_zero_max_sessions_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[server]\nmax_sessions = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.max_sessions"));
    }
}
