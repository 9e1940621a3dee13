//! pdfchat CLI.
//!
//! ```bash
//! pdfchat ask report.pdf "Which species are critically endangered?"
//! pdfchat script report.pdf "scientific name and threat category" --page 3 \
//!     --save extract.py --output species.csv
//! pdfchat chunks report.pdf --page 1
//! pdfchat sanitize generated.py
//! pdfchat convert species.csv species.json
//! ```
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pdfchat::artifact;
use pdfchat::config::Config;
use pdfchat::pdf;
use pdfchat::pipeline::{AnswerPipeline, PipelineRun};
use pdfchat::sanitizer::Sanitizer;
use pdfchat::text;

#[derive(Parser)]
#[command(name = "pdfchat", version, about)]
struct Cli {
    /// Configuration file (default: pdfchat.json)
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question about a PDF
    Ask {
        pdf: PathBuf,
        question: String,
        /// Only use this page (1-based)
        #[arg(long)]
        page: Option<usize>,
    },
    /// Generate an extraction script for a PDF and optionally run it
    Script {
        pdf: PathBuf,
        /// What data to extract
        instruction: String,
        /// Page shown to the model as the layout sample (1-based)
        #[arg(long)]
        page: Option<usize>,
        /// Write the sanitized script here
        #[arg(long)]
        save: Option<PathBuf>,
        /// Run the script on the PDF, writing CSV or JSON here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the chunks of a PDF
    Chunks {
        pdf: PathBuf,
        #[arg(long)]
        page: Option<usize>,
    },
    /// Sanitize generated code from a file or stdin
    Sanitize { file: Option<PathBuf> },
    /// Convert a table between CSV and JSON
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    // 2. Dispatch
    match cli.command {
        Command::Ask {
            pdf: path,
            question,
            page,
        } => {
            let document = document_text(&path, page)?;
            let mut pipeline = AnswerPipeline::from_config(&config)?;
            let run = pipeline.ask(&document, &question);
            Ok(report(&run, |run| {
                println!("{}", run.answer.as_deref().unwrap_or_default());
            }))
        }
        Command::Script {
            pdf: path,
            instruction,
            page,
            save,
            output,
        } => {
            let document = document_text(&path, None)?;
            let sample = match page {
                Some(page) => Some(pdf::extract_page_text(&path, page)?),
                None => None,
            };

            let mut pipeline = AnswerPipeline::from_config(&config)?;
            let mut run = pipeline.generate_script(&document, &instruction, sample.as_deref());
            if run.is_failed() {
                return Ok(report(&run, |_| {}));
            }

            let script = run
                .sanitized
                .as_ref()
                .map(|s| s.text())
                .unwrap_or_default();
            match &save {
                Some(save) => {
                    std::fs::write(save, &script)
                        .with_context(|| format!("failed to write {}", save.display()))?;
                    info!("Saved script to {}", save.display());
                }
                None => println!("{script}"),
            }

            if let Some(output) = output {
                let _ = pipeline.execute(&mut run, &path, &output);
                return Ok(report(&run, |run| {
                    if let Some(exec) = &run.execution {
                        print!("{}", exec.stdout);
                    }
                    match run.artifact_rows {
                        Some(rows) => eprintln!("Wrote {rows} rows to {}", output.display()),
                        None => eprintln!("Script finished; output at {}", output.display()),
                    }
                }));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Chunks { pdf: path, page } => {
            let document = text::normalize(&document_text(&path, page)?);
            let chunks = text::chunk(&document, config.chunk_size, config.chunk_overlap)?;
            for chunk in &chunks {
                println!(
                    "[{}] {}..{}\n{}\n",
                    chunk.index, chunk.source_start, chunk.source_end, chunk.text
                );
            }
            info!("{} chunks", chunks.len());
            Ok(ExitCode::SUCCESS)
        }
        Command::Sanitize { file } => {
            let code = match file {
                Some(file) => std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let sanitizer = Sanitizer::from_config(&config.sanitizer)?;
            let sanitized = sanitizer.sanitize(&code);
            println!("{}", sanitized.text());
            if let Some(quote) = sanitized.unterminated_quote {
                eprintln!("warning: unterminated {quote} string");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Convert { input, output } => {
            let table = artifact::read_table(&input)?;
            artifact::write_table(&table, &output)?;
            info!("Converted {} rows", table.row_count());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Text of the whole document, or of one page.
fn document_text(path: &Path, page: Option<usize>) -> Result<String> {
    if !path.exists() {
        bail!("no such file: {}", path.display());
    }
    let text = match page {
        Some(page) => pdf::extract_page_text(path, page)?,
        None => pdf::extract_text(path),
    };
    if text.trim().is_empty() {
        bail!("no text could be extracted from {}", path.display());
    }
    Ok(text)
}

/// Print the outcome of a run; failures go to stderr with a non-zero exit.
fn report(run: &PipelineRun, on_success: impl FnOnce(&PipelineRun)) -> ExitCode {
    match run.error() {
        Some(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        None => {
            on_success(run);
            ExitCode::SUCCESS
        }
    }
}
