//! The answer pipeline: normalize → chunk → retrieve → prompt → generate,
//! then optionally sanitize → execute for generated scripts.
//!
//! Stages are explicit transitions over a [`PipelineRun`]. A transition
//! whose input artifact is missing fails with
//! [`PipelineError::PreconditionNotMet`]; any failure moves the run to
//! [`Stage::Failed`] with a user-facing message and is never retried.
pub mod state;

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::artifact::{self, TableFormat};
use crate::config::Config;
use crate::embedder;
use crate::error::PipelineError;
use crate::execution::{ExecutionError, ScriptRunner, SubprocessRunner};
use crate::generation::extract::{extract_answer, extract_code};
use crate::generation::prompt::{SCRIPT_SCAFFOLD, answer_prompt, script_prompt};
use crate::generation::{GenerationRequest, Generator, OllamaClient};
use crate::retrieval::{self, RetrievalIndex, build_context};
use crate::sanitizer::Sanitizer;
use crate::text;

pub use state::{PipelineRun, Prompt, PromptKind, PromptRequest, Stage};

/// Tunables used by the stages.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub json_format: bool,
    /// Starter script shown to the model for script generation.
    pub scaffold: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.search_top_k,
            json_format: config.generation.json_format,
            scaffold: SCRIPT_SCAFFOLD.to_string(),
        }
    }
}

pub struct AnswerPipeline {
    index: Box<dyn RetrievalIndex>,
    generator: Box<dyn Generator>,
    runner: Box<dyn ScriptRunner>,
    sanitizer: Sanitizer,
    settings: PipelineSettings,
    /// Run and chunk set currently held by the index.
    indexed: Option<(u64, u64)>,
}

fn require<'a, T>(
    artifact: &'a Option<T>,
    action: &'static str,
    missing: &'static str,
) -> Result<&'a T, PipelineError> {
    artifact
        .as_ref()
        .ok_or(PipelineError::PreconditionNotMet { action, missing })
}

impl AnswerPipeline {
    pub fn new(
        index: Box<dyn RetrievalIndex>,
        generator: Box<dyn Generator>,
        runner: Box<dyn ScriptRunner>,
        sanitizer: Sanitizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            index,
            generator,
            runner,
            sanitizer,
            settings,
            indexed: None,
        }
    }

    /// Wire up the configured embedder, index, generation client and runner.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = embedder::from_config(&config.embedding, &config.generation);
        let index = retrieval::open_index(&config.index, embedder)
            .context("failed to open retrieval index")?;
        let generator =
            OllamaClient::new(&config.generation).context("failed to build generation client")?;
        let sanitizer = Sanitizer::from_config(&config.sanitizer)
            .context("invalid sanitizer.protected_patterns")?;

        Ok(Self::new(
            index,
            Box::new(generator),
            Box::new(SubprocessRunner::from_config(&config.execution)),
            sanitizer,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    // ── Stages ───────────────────────────────────────────────────────

    /// Idle → Normalized. Starts over: every later artifact is dropped.
    pub fn normalize(&self, run: &mut PipelineRun, raw: &str) -> Result<(), PipelineError> {
        run.reset_after(Stage::Idle);
        let document = text::normalize(raw);
        info!("Normalized {} chars to {}", raw.len(), document.len());
        run.document = Some(document);
        run.record(Stage::Normalized, Ok(()))
    }

    /// Normalized → Chunked.
    pub fn chunk(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let result = self.try_chunk(run);
        run.record(Stage::Chunked, result)
    }

    fn try_chunk(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let document = require(&run.document, "chunk", "normalized document")?;
        let chunks = text::chunk(
            document,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;
        info!("Split document into {} chunks", chunks.len());

        run.reset_after(Stage::Normalized);
        run.chunks = Some(chunks);
        Ok(())
    }

    /// Chunked → Retrieved.
    ///
    /// The index is cleared and filled with the run's chunks the first time
    /// they are queried; later queries on the same chunks reuse it.
    pub fn retrieve(&mut self, run: &mut PipelineRun, query: &str) -> Result<(), PipelineError> {
        let result = self.try_retrieve(run, query);
        run.record(Stage::Retrieved, result)
    }

    fn try_retrieve(&mut self, run: &mut PipelineRun, query: &str) -> Result<(), PipelineError> {
        let chunks = require(&run.chunks, "retrieve", "chunks")?;

        if self.indexed != Some(run.chunk_key()) {
            self.indexed = None;
            self.index.clear()?;
            self.index.add_chunks(chunks)?;
            self.indexed = Some(run.chunk_key());
            debug!("Indexed {} chunks", chunks.len());
        }

        let results = self.index.query(query, self.settings.top_k)?;
        info!("Retrieved {} chunks for query", results.len());

        run.reset_after(Stage::Chunked);
        run.query = Some(query.to_string());
        run.retrieved = Some(results);
        Ok(())
    }

    /// Retrieved → Prompted. A script request that brings its own sample
    /// does not need retrieved context.
    pub fn prompt(&self, run: &mut PipelineRun, request: PromptRequest) -> Result<(), PipelineError> {
        let result = self.try_prompt(run, request);
        run.record(Stage::Prompted, result)
    }

    fn try_prompt(&self, run: &mut PipelineRun, request: PromptRequest) -> Result<(), PipelineError> {
        let json_format = self.settings.json_format;
        let prompt = match request {
            PromptRequest::Answer { question } => {
                let retrieved = require(&run.retrieved, "build a prompt", "retrieved context")?;
                Prompt {
                    kind: PromptKind::Answer,
                    text: answer_prompt(&question, &build_context(retrieved), json_format),
                    json_format,
                }
            }
            PromptRequest::Script {
                instruction,
                sample,
            } => {
                let sample = match sample {
                    Some(sample) => sample,
                    None => build_context(require(
                        &run.retrieved,
                        "build a prompt",
                        "retrieved context",
                    )?),
                };
                Prompt {
                    kind: PromptKind::Script,
                    text: script_prompt(&instruction, &sample, &self.settings.scaffold),
                    json_format,
                }
            }
        };
        debug!("Built {:?} prompt of {} chars", prompt.kind, prompt.text.len());

        run.reset_after(Stage::Retrieved);
        run.prompt = Some(prompt);
        Ok(())
    }

    /// Prompted → Generated.
    pub fn generate(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let result = self.try_generate(run);
        run.record(Stage::Generated, result)
    }

    fn try_generate(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let prompt = require(&run.prompt, "generate", "prompt")?;
        let request = GenerationRequest::new(prompt.text.clone(), prompt.json_format);
        let kind = prompt.kind;

        let response = self.generator.generate(&request)?;
        info!(
            "{} returned {} chars",
            self.generator.model(),
            response.len()
        );

        run.reset_after(Stage::Prompted);
        // Kept even when nothing usable can be extracted from it.
        run.response = Some(response.clone());
        match kind {
            PromptKind::Answer => run.answer = Some(extract_answer(&response)?),
            PromptKind::Script => run.script = Some(extract_code(&response)?),
        }
        Ok(())
    }

    /// Generated → Sanitized.
    pub fn sanitize(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let result = self.try_sanitize(run);
        run.record(Stage::Sanitized, result)
    }

    fn try_sanitize(&self, run: &mut PipelineRun) -> Result<(), PipelineError> {
        let script = require(&run.script, "sanitize", "generated script")?;
        let sanitized = self.sanitizer.sanitize(script);
        if let Some(quote) = sanitized.unterminated_quote {
            warn!("Sanitized script still has an open {quote} string");
        }

        run.reset_after(Stage::Generated);
        run.sanitized = Some(sanitized);
        Ok(())
    }

    /// Sanitized → Executed. Runs the script as
    /// `<interpreter> <script> <input> <output>`.
    pub fn execute(
        &self,
        run: &mut PipelineRun,
        input: &Path,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let result = self.try_execute(run, input, output);
        run.record(Stage::Executed, result)
    }

    fn try_execute(
        &self,
        run: &mut PipelineRun,
        input: &Path,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let script = require(&run.sanitized, "execute", "sanitized script")?.text();
        run.reset_after(Stage::Sanitized);

        let report = match self.runner.run(&script, input, output) {
            Ok(report) => report,
            Err(err) => {
                if let ExecutionError::TimedOut { report, .. } = &err {
                    run.execution = Some(report.as_ref().clone());
                }
                return Err(err.into());
            }
        };
        let outcome = if report.success {
            run.artifact_rows = count_rows(output);
            Ok(())
        } else {
            Err(PipelineError::ExecutionFailure {
                status: report.status_label(),
                stderr: report.stderr.clone(),
            })
        };
        run.execution = Some(report);
        outcome
    }

    // ── Whole flows ──────────────────────────────────────────────────

    /// Answer a question about `raw` document text.
    ///
    /// The returned run holds the answer, or the stage that failed and why.
    pub fn ask(&mut self, raw: &str, question: &str) -> PipelineRun {
        let mut run = PipelineRun::new();
        if let Err(e) = self.try_ask(&mut run, raw, question) {
            warn!("ask failed: {e}");
        }
        run
    }

    fn try_ask(&mut self, run: &mut PipelineRun, raw: &str, question: &str) -> Result<(), PipelineError> {
        self.normalize(run, raw)?;
        self.chunk(run)?;
        self.retrieve(run, question)?;
        self.prompt(
            run,
            PromptRequest::Answer {
                question: question.to_string(),
            },
        )?;
        self.generate(run)
    }

    /// Generate and sanitize an extraction script for `raw` document text.
    ///
    /// With no `sample`, the chunks most relevant to the instruction are
    /// used as the sample. Execution is left to [`AnswerPipeline::execute`].
    pub fn generate_script(
        &mut self,
        raw: &str,
        instruction: &str,
        sample: Option<&str>,
    ) -> PipelineRun {
        let mut run = PipelineRun::new();
        if let Err(e) = self.try_generate_script(&mut run, raw, instruction, sample) {
            warn!("script generation failed: {e}");
        }
        run
    }

    fn try_generate_script(
        &mut self,
        run: &mut PipelineRun,
        raw: &str,
        instruction: &str,
        sample: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.normalize(run, raw)?;
        self.chunk(run)?;
        if sample.is_none() {
            self.retrieve(run, instruction)?;
        }
        self.prompt(
            run,
            PromptRequest::Script {
                instruction: instruction.to_string(),
                sample: sample.map(str::to_string),
            },
        )?;
        self.generate(run)?;
        self.sanitize(run)
    }
}

/// Row count of the artifact a script wrote, if it is a readable table.
fn count_rows(output: &Path) -> Option<usize> {
    TableFormat::from_path(output)?;
    if !output.exists() {
        warn!("Script succeeded but wrote no {}", output.display());
        return None;
    }
    match artifact::read_table(output) {
        Ok(table) => {
            info!("Output artifact has {} rows", table.row_count());
            Some(table.row_count())
        }
        Err(e) => {
            warn!("Could not read output artifact: {e:#}");
            None
        }
    }
}
