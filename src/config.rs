/// Configuration module for pdfchat.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "pdfchat.json";

// ── Default value functions ──────────────────────────────────────────

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_search_top_k() -> usize {
    3
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_generation_model() -> String {
    "qwen2.5:latest".to_string()
}

fn default_true() -> bool {
    true
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_execution_timeout() -> u64 {
    300
}

fn default_protected_patterns() -> Vec<String> {
    vec![
        // text.split("\n") / text.split('\n')
        r#"\.split\(\s*(?:"\\n"|'\\n')\s*\)"#.to_string(),
        // "\n".join(rows)
        r#"(?:"\\n"|'\\n')\.join\("#.to_string(),
    ]
}

fn default_line_comment() -> Option<String> {
    Some("#".to_string())
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Ask the server for a JSON-formatted response.
    #[serde(default = "default_true")]
    pub json_format: bool,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hashing,
    Ollama,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Hashing
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_backend")]
    pub backend: IndexBackend,

    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_index_backend() -> IndexBackend {
    IndexBackend::Memory
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutionConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_execution_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SanitizerConfig {
    /// Regexes for lines the escape pass must leave verbatim.
    #[serde(default = "default_protected_patterns")]
    pub protected_patterns: Vec<String>,

    #[serde(default = "default_line_comment")]
    pub line_comment: Option<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            search_top_k: default_search_top_k(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            execution: ExecutionConfig::default(),
            sanitizer: SanitizerConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_generation_model(),
            temperature: None,
            json_format: default_true(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            db_path: default_db_path(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_execution_timeout(),
        }
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            protected_patterns: default_protected_patterns(),
            line_comment: default_line_comment(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl GenerationConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ExecutionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            self.generation.timeout_secs > 0,
            "generation.timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.execution.timeout_secs > 0,
            "execution.timeout_secs must be positive"
        );
        anyhow::ensure!(
            !self.execution.interpreter.trim().is_empty(),
            "execution.interpreter must not be empty"
        );
        for pattern in &self.sanitizer.protected_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("invalid sanitizer.protected_patterns entry: {pattern}"))?;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
