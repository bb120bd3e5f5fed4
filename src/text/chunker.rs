//! Splits input text into fragments small enough for a TTS model.
//!
//! Sentences are never cut: a sentence longer than the budget becomes a
//! fragment of its own. Lengths are counted in `char`s.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NarrateError;

// Terminal punctuation followed by whitespace; the punctuation stays with its sentence
static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// How input text is cut into fragments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SplitStrategy {
    /// Pack whole sentences greedily up to the character budget
    #[default]
    #[serde(alias = "punct", alias = "sentence")]
    SentenceAware,
    /// Send the whole text as one fragment
    #[serde(alias = "none")]
    PassThrough,
}

impl FromStr for SplitStrategy {
    type Err = NarrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "punct" | "sentence" | "sentence-aware" => Ok(SplitStrategy::SentenceAware),
            "none" | "pass-through" => Ok(SplitStrategy::PassThrough),
            other => Err(NarrateError::validation(format!(
                "Unknown split strategy '{}'. Use 'punct' or 'none'.",
                other
            ))),
        }
    }
}

/// One piece of text handed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment(String);

impl TextFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in chars, the unit `max_chars` is measured in
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for TextFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TextFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // punctuation is a single ASCII byte
        sentences.push(&text[start..boundary.start() + 1]);
        start = boundary.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Cut `text` into fragments of at most `max_chars` chars.
///
/// `max_chars == 0` or [`SplitStrategy::PassThrough`] disables chunking.
/// Whitespace-only input yields no fragments; rejecting it is up to the caller.
pub fn chunk_text(text: &str, max_chars: usize, strategy: SplitStrategy) -> Vec<TextFragment> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if strategy == SplitStrategy::PassThrough || max_chars == 0 {
        return vec![TextFragment(trimmed.to_string())];
    }

    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(trimmed) {
        let sentence_len = sentence.chars().count();

        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len <= max_chars {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        } else {
            fragments.push(TextFragment(std::mem::take(&mut current)));
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        fragments.push(TextFragment(current));
    }

    fragments
}
