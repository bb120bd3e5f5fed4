//! Text preparation for synthesis

pub mod chunker;

pub use chunker::{chunk_text, SplitStrategy, TextFragment};
