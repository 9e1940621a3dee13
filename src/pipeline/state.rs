//! The value object carried between pipeline stages.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PipelineError;
use crate::execution::ExecutionReport;
use crate::retrieval::RetrievalResult;
use crate::sanitizer::SanitizedScript;
use crate::text::Chunk;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    Normalized,
    Chunked,
    Retrieved,
    Prompted,
    Generated,
    Sanitized,
    Executed,
    Failed,
}

/// What a prompt asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Answer,
    Script,
}

/// Input to the prompt stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest {
    Answer {
        question: String,
    },
    /// With no `sample`, the retrieved context is shown as the sample.
    Script {
        instruction: String,
        sample: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
    pub json_format: bool,
}

/// State of one pass through the pipeline.
///
/// Every artifact is `None` until the stage producing it has succeeded.
/// Re-running a stage drops the artifacts of every later stage.
#[derive(Debug)]
pub struct PipelineRun {
    id: u64,
    stage: Stage,
    error: Option<String>,
    chunk_version: u64,

    pub document: Option<String>,
    pub chunks: Option<Vec<Chunk>>,
    pub query: Option<String>,
    pub retrieved: Option<Vec<RetrievalResult>>,
    pub prompt: Option<Prompt>,
    pub response: Option<String>,
    pub answer: Option<String>,
    pub script: Option<String>,
    pub sanitized: Option<SanitizedScript>,
    pub execution: Option<ExecutionReport>,
    /// Rows in the output artifact after a successful execution.
    pub artifact_rows: Option<usize>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            stage: Stage::Idle,
            error: None,
            chunk_version: 0,
            document: None,
            chunks: None,
            query: None,
            retrieved: None,
            prompt: None,
            response: None,
            answer: None,
            script: None,
            sanitized: None,
            execution: None,
            artifact_rows: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// User-facing message of the last failed transition.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.stage == Stage::Failed
    }

    /// Identifies the chunk set the run currently holds.
    pub(crate) fn chunk_key(&self) -> (u64, u64) {
        (self.id, self.chunk_version)
    }

    /// Drop every artifact produced after `stage`.
    pub(crate) fn reset_after(&mut self, stage: Stage) {
        let keep = |s: Stage| (s as u8) <= (stage as u8);

        if !keep(Stage::Normalized) {
            self.document = None;
        }
        if !keep(Stage::Chunked) {
            self.chunks = None;
            self.chunk_version += 1;
        }
        if !keep(Stage::Retrieved) {
            self.query = None;
            self.retrieved = None;
        }
        if !keep(Stage::Prompted) {
            self.prompt = None;
        }
        if !keep(Stage::Generated) {
            self.response = None;
            self.answer = None;
            self.script = None;
        }
        if !keep(Stage::Sanitized) {
            self.sanitized = None;
        }
        if !keep(Stage::Executed) {
            self.execution = None;
            self.artifact_rows = None;
        }
    }

    /// Record the outcome of a transition into `stage`.
    pub(crate) fn record(
        &mut self,
        stage: Stage,
        result: Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        match &result {
            Ok(()) => {
                self.stage = stage;
                self.error = None;
            }
            Err(e) => {
                self.stage = Stage::Failed;
                self.error = Some(e.user_message());
            }
        }
        result
    }
}
