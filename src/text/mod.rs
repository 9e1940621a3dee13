//! Text preparation: whitespace/hyphenation cleanup and overlapping chunking.
pub mod chunker;
pub mod normalize;

pub use chunker::{Chunk, chunk, chunk_text};
pub use normalize::normalize;
