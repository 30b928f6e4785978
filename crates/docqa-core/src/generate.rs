//! Text generation capability.
//!
//! A [`Generator`] turns an ordered list of chat [`Turn`]s into one reply.
//! Concrete backends (OpenAI chat completions, Ollama) live in the `docqa`
//! app crate; the pipeline only sees this trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Turn;

/// Per-call overrides for a generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Model to use instead of the backend's configured default.
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Default model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Produce a reply to `messages`, which start with a system turn.
    async fn generate(&self, messages: &[Turn], opts: &GenerateOptions) -> Result<String>;
}
