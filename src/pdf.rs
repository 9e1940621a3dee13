//! PDF text extraction.
//!
//! `lopdf` is tried first; when it fails or finds no text, `pdf-extract`
//! is used instead. [`extract_text`] never fails: a document neither backend
//! can read yields an empty string.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use lopdf::Document;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("lopdf: {0}")]
    Lopdf(#[from] lopdf::Error),

    #[error("pdf-extract: {0}")]
    PdfExtract(String),

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("no extractable text")]
    Empty,
}

// ── Backends ─────────────────────────────────────────────────────────

fn page_texts_lopdf(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let doc = Document::load(path)?;
    let mut texts = Vec::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("lopdf could not read page {page} of {}: {e}", path.display());
                texts.push(String::new());
            }
        }
    }
    Ok(texts)
}

fn page_texts_pdf_extract(path: &Path) -> Result<Vec<String>, ExtractionError> {
    // pdf-extract panics on some malformed fonts.
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionError::PdfExtract(e.to_string())),
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "panic".to_string()
            };
            Err(ExtractionError::PdfExtract(msg))
        }
    }
}

fn has_text(pages: &[String]) -> bool {
    pages.iter().any(|p| !p.trim().is_empty())
}

/// Per-page text from the first backend that finds any.
fn page_texts(path: &Path) -> Result<Vec<String>, ExtractionError> {
    match page_texts_lopdf(path) {
        Ok(pages) if has_text(&pages) => return Ok(pages),
        Ok(_) => warn!("lopdf found no text in {}, trying pdf-extract", path.display()),
        Err(e) => warn!("lopdf failed on {}: {e}, trying pdf-extract", path.display()),
    }

    let pages = page_texts_pdf_extract(path)?;
    if has_text(&pages) {
        Ok(pages)
    } else {
        Err(ExtractionError::Empty)
    }
}

// ── Public API ───────────────────────────────────────────────────────

/// Text of the whole document, pages separated by newlines.
pub fn extract_text(path: &Path) -> String {
    match page_texts(path) {
        Ok(pages) => {
            let text = pages.join("\n");
            info!(
                "Extracted {} chars from {} pages of {}",
                text.len(),
                pages.len(),
                path.display()
            );
            text
        }
        Err(e) => {
            warn!("No text extracted from {}: {e}", path.display());
            String::new()
        }
    }
}

pub fn page_count(path: &Path) -> Result<usize, ExtractionError> {
    match Document::load(path) {
        Ok(doc) => Ok(doc.get_pages().len()),
        Err(e) => {
            warn!("lopdf failed on {}: {e}, counting with pdf-extract", path.display());
            Ok(page_texts_pdf_extract(path)?.len())
        }
    }
}

/// Text of one page, numbered from 1.
pub fn extract_page_text(path: &Path, page: usize) -> Result<String, ExtractionError> {
    let pages = page_texts(path)?;
    if page == 0 || page > pages.len() {
        return Err(ExtractionError::PageOutOfRange {
            page,
            count: pages.len(),
        });
    }
    Ok(pages[page - 1].clone())
}
