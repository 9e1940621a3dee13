//! Stage-boundary error taxonomy for the answer pipeline.
//!
//! Collaborators report their own error types (`EmbedderError`,
//! `RetrievalError`, `GenerationError`, `ExecutionError`); the pipeline folds
//! them into [`PipelineError`] at each stage boundary and renders a
//! user-facing message from it. Nothing is retried.
use thiserror::Error;

use crate::execution::ExecutionError;
use crate::generation::GenerationError;
use crate::retrieval::RetrievalError;

/// Errors surfaced by pipeline stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot {action}: no {missing} available")]
    PreconditionNotMet {
        action: &'static str,
        missing: &'static str,
    },

    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(#[from] RetrievalError),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("malformed generation response: {0}")]
    MalformedGenerationResponse(String),

    #[error("script execution failed ({status}): {stderr}")]
    ExecutionFailure { status: String, stderr: String },
}

impl PipelineError {
    /// Message shown to the user when a stage fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument(msg) => format!("Invalid input: {msg}"),
            Self::PreconditionNotMet { action, missing } => {
                format!("Cannot {action} yet: no {missing} is available. Run the earlier step first.")
            }
            Self::RetrievalUnavailable(e) => format!("Error searching the document: {e}"),
            Self::GenerationUnavailable(e) => {
                format!("Error connecting to the generation service: {e}")
            }
            Self::MalformedGenerationResponse(e) => {
                format!("Error: unexpected response format from the generation service ({e})")
            }
            Self::ExecutionFailure { status, stderr } => {
                format!("Error running script ({status}):\n{stderr}")
            }
        }
    }
}

impl From<GenerationError> for PipelineError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Malformed(msg) => Self::MalformedGenerationResponse(msg),
            other => Self::GenerationUnavailable(other.to_string()),
        }
    }
}

impl From<ExecutionError> for PipelineError {
    fn from(err: ExecutionError) -> Self {
        let status = match &err {
            ExecutionError::TimedOut { .. } => "timed out".to_string(),
            ExecutionError::Spawn { .. } => "not started".to_string(),
            ExecutionError::Io(_) => "i/o error".to_string(),
        };
        Self::ExecutionFailure {
            status,
            stderr: err.to_string(),
        }
    }
}
