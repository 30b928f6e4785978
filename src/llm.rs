//! Chat-completion backends implementing [`Generator`].
//!
//! - **[`OpenAiGenerator`]**: `POST {base}/v1/chat/completions`, reads
//!   `choices[0].message.content`.
//! - **[`OllamaGenerator`]**: `POST {base}/api/chat` with `stream: false`,
//!   reads `message.content`.
//! - **[`DisabledGenerator`]**: always errors, so every answer is the
//!   synthesizer's fallback text.
//!
//! Generation is attempted once per call; timeouts come from the HTTP
//! client and from the synthesizer's own deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use docqa_core::generate::{GenerateOptions, Generator};
use docqa_core::models::Turn;

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Create the generator selected by `[llm].provider`.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>, LlmError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            Ok(Arc::new(OpenAiGenerator::new(
                api_key,
                config.model.clone(),
                base_url,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "ollama" => {
            let url = config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Arc::new(OllamaGenerator::new(
                url,
                config.model.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _messages: &[Turn], _opts: &GenerateOptions) -> anyhow::Result<String> {
        Err(LlmError::NotConfigured("LLM provider is disabled".into()).into())
    }
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[Turn], opts: &GenerateOptions) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = opts.model.as_deref().unwrap_or(&self.model);

        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }

        debug!(model, "OpenAI request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body }.into());
        }

        let resp: serde_json::Value = response.json().await.map_err(LlmError::from)?;
        Ok(parse_openai_content(&resp)?)
    }
}

fn parse_openai_content(resp: &serde_json::Value) -> Result<String, LlmError> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError("missing choices[0].message.content".into()))
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(url: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[Turn], opts: &GenerateOptions) -> anyhow::Result<String> {
        let url = format!("{}/api/chat", self.url);
        let model = opts.model.as_deref().unwrap_or(&self.model);

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if let Some(t) = opts.temperature {
            body["options"] = json!({ "temperature": t });
        }

        debug!(model, "Ollama request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body }.into());
        }

        let resp: serde_json::Value = response.json().await.map_err(LlmError::from)?;
        let content = resp["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::ParseError("missing message.content".into()))?
            .to_string();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_content() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "Hi."}}]});
        assert_eq!(parse_openai_content(&resp).unwrap(), "Hi.");
        assert!(matches!(
            parse_openai_content(&json!({"choices": []})),
            Err(LlmError::ParseError(_))
        ));
    }

    #[test]
    fn test_turns_serialize_as_chat_messages() {
        let body = json!({ "messages": [Turn::system("s"), Turn::user("u")] });
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let gen = create_generator(&LlmConfig::default()).unwrap();
        assert_eq!(gen.model_name(), "disabled");
        let err = gen
            .generate(&[Turn::user("hi")], &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_generator(&config),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
