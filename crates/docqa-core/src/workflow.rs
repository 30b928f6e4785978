//! Single-shot tool-routed workflow: route, then summarize.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RagError, Result};
use crate::router::ToolRouter;
use crate::synth::{SynthesisRequest, Synthesizer};

pub const DEFAULT_WORKFLOW_PROMPT: &str = "You are a helpful assistant that provides clear, concise summaries. Keep your response under 200 words.";

/// Prefix of the user message sent to the generator.
pub const INSTRUCTION: &str = "Please summarize or answer the following:";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub user_input: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub success: bool,
    pub output: String,
}

impl WorkflowResponse {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: format!("Error: {}", err),
        }
    }
}

pub struct Workflow {
    router: Arc<ToolRouter>,
    synthesizer: Arc<Synthesizer>,
}

impl Workflow {
    pub fn new(router: Arc<ToolRouter>, synthesizer: Arc<Synthesizer>) -> Self {
        Self {
            router,
            synthesizer,
        }
    }

    /// Route `request.user_input` through the selected tool (or none) and
    /// summarize the result.
    ///
    /// Only an empty `user_input` is an error; tool and generation failures
    /// are folded into the output text.
    pub async fn run(&self, request: &WorkflowRequest) -> Result<WorkflowResponse> {
        if request.user_input.trim().is_empty() {
            return Err(RagError::InvalidRequest(
                "user_input must not be empty".to_string(),
            ));
        }

        let routed = self
            .router
            .dispatch(
                request.connected,
                request.tool.as_deref(),
                &request.user_input,
            )
            .await;

        let system_prompt = request
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_WORKFLOW_PROMPT);

        let synthesis = self
            .synthesizer
            .synthesize(SynthesisRequest {
                instruction: Some(INSTRUCTION),
                model: request.model.as_deref(),
                ..SynthesisRequest::new(system_prompt, &routed.text)
            })
            .await;

        info!(
            tool = routed.tool.as_deref().unwrap_or("direct"),
            tool_fallback = routed.fallback,
            llm_fallback = synthesis.fallback,
            "workflow complete"
        );

        Ok(WorkflowResponse {
            success: true,
            output: synthesis.text,
        })
    }
}
