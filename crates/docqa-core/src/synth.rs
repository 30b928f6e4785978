//! Answer synthesis: one bounded generation call with a text fallback.
//!
//! [`Synthesizer::synthesize`] assembles the chat messages (system prompt
//! plus optional retrieved context, prior history, then the user input),
//! calls the injected [`Generator`] under a timeout, and never fails: a
//! generation error or timeout produces an annotated fallback that echoes
//! the input.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::RagError;
use crate::generate::{GenerateOptions, Generator};
use crate::models::Turn;

/// System prompt for document-grounded conversational answers.
pub const QA_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based ONLY on the provided context.

IMPORTANT RULES:
1. Only use information from the context below to answer questions
2. If the answer cannot be found in the context, respond with: \"I don't have enough information in the documents to answer this question.\"
3. Always cite which document the information comes from
4. Do not make up or infer information beyond what's explicitly stated
5. Be concise and direct in your answers
6. You can refer to previous conversation when relevant";

/// Longest echo of the input kept in a fallback, in characters.
pub const FALLBACK_ECHO_CHARS: usize = 300;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Inputs to one synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub system_prompt: &'a str,
    /// Retrieved context appended to the system prompt under `Context:`.
    pub context: Option<&'a str>,
    pub history: &'a [Turn],
    /// The user's text. Echoed back in a fallback.
    pub input: &'a str,
    /// Text placed before `input` in the user message.
    pub instruction: Option<&'a str>,
    /// Per-call model override.
    pub model: Option<&'a str>,
}

impl<'a> SynthesisRequest<'a> {
    pub fn new(system_prompt: &'a str, input: &'a str) -> Self {
        Self {
            system_prompt,
            context: None,
            history: &[],
            input,
            instruction: None,
            model: None,
        }
    }

    /// Ordered chat messages handed to the generator.
    pub fn messages(&self) -> Vec<Turn> {
        let system = match self.context {
            Some(ctx) => format!("{}\n\nContext:\n{}", self.system_prompt, ctx),
            None => self.system_prompt.to_string(),
        };
        let user = match self.instruction {
            Some(prefix) => format!("{}\n\n{}", prefix, self.input),
            None => self.input.to_string(),
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Turn::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(Turn::user(user));
        messages
    }
}

/// Generated text, or the fallback when generation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub text: String,
    pub fallback: bool,
}

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    timeout: Duration,
    temperature: Option<f32>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub async fn synthesize(&self, request: SynthesisRequest<'_>) -> Synthesis {
        let messages = request.messages();
        let opts = GenerateOptions {
            model: request.model.map(str::to_string),
            temperature: self.temperature,
        };

        let outcome =
            tokio::time::timeout(self.timeout, self.generator.generate(&messages, &opts)).await;

        let err = match outcome {
            Ok(Ok(text)) => {
                return Synthesis {
                    text,
                    fallback: false,
                }
            }
            Ok(Err(e)) => RagError::Synthesis(format!("{:#}", e)),
            Err(_) => RagError::Synthesis(format!("timed out after {}s", self.timeout.as_secs())),
        };

        warn!(model = self.generator.model_name(), error = %err, "generation fell back");
        Synthesis {
            text: fallback_text(request.input, &err),
            fallback: true,
        }
    }
}

/// `"SUMMARY (Fallback):\n<echo>\n\n[LLM Error: <err>]"`, with the echo cut
/// to [`FALLBACK_ECHO_CHARS`] characters.
pub fn fallback_text(input: &str, err: &dyn std::fmt::Display) -> String {
    let echo = if input.chars().count() > FALLBACK_ECHO_CHARS {
        let kept: String = input.chars().take(FALLBACK_ECHO_CHARS - 3).collect();
        format!("{}...", kept)
    } else {
        input.to_string()
    };
    format!("SUMMARY (Fallback):\n{}\n\n[LLM Error: {}]", echo, err)
}
