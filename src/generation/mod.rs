//! Text generation collaborator: client, prompts and response parsing.
pub mod extract;
pub mod ollama;
pub mod prompt;

use thiserror::Error;

pub use ollama::OllamaClient;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{0}")]
    Malformed(String),
}

/// One prompt sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Ask for a JSON-formatted response.
    pub json_format: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, json_format: bool) -> Self {
        Self {
            prompt: prompt.into(),
            json_format,
        }
    }
}

/// A service that turns a prompt into text.
pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}
