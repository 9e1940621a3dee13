//! # pdfchat: chat with your PDF
//!
//! Extracts text from a PDF, splits it into overlapping chunks, retrieves the
//! chunks relevant to a question and asks a locally hosted language model to
//! answer it, or to write an extraction script that is sanitized and then run
//! in a separate process.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration loading and validation
//! - **[`pdf`]**: PDF text extraction (lopdf, pdf-extract fallback)
//! - **[`text`]**: whitespace/hyphenation normalization and chunking
//! - **[`embedder`]**: text embedding (offline feature hashing or Ollama)
//! - **[`retrieval`]**: retrieval index contract and in-memory backend
//! - **[`db`]**: SQLite + sqlite-vec retrieval backend
//! - **[`generation`]**: Ollama client, prompt templates, answer/code extraction
//! - **[`sanitizer`]**: escape and quote repair for generated code
//! - **[`execution`]**: sandboxed subprocess runner for generated scripts
//! - **[`artifact`]**: CSV / JSON output tables
//! - **[`pipeline`]**: the staged answer pipeline
//! - **[`error`]**: stage-boundary errors and user-facing messages

pub mod artifact;
pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod execution;
pub mod generation;
pub mod pdf;
pub mod pipeline;
pub mod retrieval;
pub mod sanitizer;
pub mod text;

pub use error::PipelineError;
pub use pipeline::{AnswerPipeline, PipelineRun, Stage};
