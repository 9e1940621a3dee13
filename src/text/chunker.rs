use crate::error::PipelineError;

/// A window of normalized document text used as a retrieval unit.
///
/// `source_start..source_end` is the untrimmed window in the normalized text,
/// measured in characters; `text` is that window with surrounding whitespace
/// trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub source_start: usize,
    pub source_end: usize,
}

impl Chunk {
    /// Length of the untrimmed window in characters.
    #[must_use]
    pub fn span_len(&self) -> usize {
        self.source_end - self.source_start
    }
}

/// Splits `text` into overlapping windows of up to `size` characters.
///
/// Window `i` starts at `i * (size - overlap)`. Splitting stops once a window
/// reaches the end of the text, so the last window may be shorter than `size`
/// and no window is ever fully contained in its predecessor's overlap.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, PipelineError> {
    if size == 0 {
        return Err(PipelineError::InvalidArgument(
            "chunk size must be positive".to_string(),
        ));
    }
    if overlap >= size {
        return Err(PipelineError::InvalidArgument(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let stride = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_len {
        let end = (start + size).min(char_len);
        let window = &text[boundaries[start]..boundaries[end]];

        chunks.push(Chunk {
            text: window.trim().to_string(),
            index: chunks.len(),
            source_start: start,
            source_end: end,
        });

        if end == char_len {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Same as [`chunk`], returning only the trimmed chunk texts.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, PipelineError> {
    Ok(chunk(text, size, overlap)?
        .into_iter()
        .map(|c| c.text)
        .collect())
}
