//! Error taxonomy for the RAG pipeline.
//!
//! Ingestion errors ([`RagError::UnsupportedFormat`], [`RagError::Load`])
//! are reported per file and never abort a batch. [`RagError::Storage`] is
//! surfaced to the caller as a failed operation. [`RagError::ToolInvocation`]
//! and [`RagError::Synthesis`] are recovered locally into annotated fallback
//! text and only appear inside logs and [`crate::synth::Synthesis`].

use std::path::PathBuf;

/// Every failure kind the pipeline distinguishes.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("unsupported file type '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{tool} invocation failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("generation failed: {0}")]
    Synthesis(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RagError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        RagError::Storage(err.to_string())
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::UnsupportedFormat { .. } => "unsupported_format",
            RagError::Load { .. } => "load_error",
            RagError::Storage(_) => "storage_error",
            RagError::ToolInvocation { .. } => "tool_error",
            RagError::Synthesis(_) => "synthesis_error",
            RagError::InvalidRequest(_) => "bad_request",
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_message_names_extension() {
        let err = RagError::UnsupportedFormat {
            path: PathBuf::from("notes.csv"),
            extension: ".csv".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported file type '.csv' for notes.csv");
        assert_eq!(err.code(), "unsupported_format");
    }
}
