//! Token estimation and budget-aware truncation
//!
//! Every component that needs a token count goes through [`TokenEstimator`],
//! so swapping the cheap character heuristic for an exact BPE tokenizer does
//! not change any other contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};
use unicode_segmentation::UnicodeSegmentation;

/// Tokenizer errors
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Failed to initialize {encoding} tokenizer: {message}")]
    Init { encoding: &'static str, message: String },
}

/// Estimates how many tokens a piece of text costs
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count; zero only for empty text
    fn estimate(&self, text: &str) -> u32;

    /// Get estimator name (for logging)
    fn name(&self) -> &'static str;
}

/// Which estimator a configuration asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// ~4 characters per token
    #[default]
    Chars,
    /// GPT-4 / GPT-3.5 BPE
    Cl100k,
    /// GPT-4o BPE
    O200k,
}

impl EstimatorKind {
    /// Build the estimator
    pub fn build(self) -> Result<Box<dyn TokenEstimator>, TokenizerError> {
        Ok(match self {
            Self::Chars => Box::new(CharRatioEstimator::default()),
            Self::Cl100k => Box::new(BpeEstimator::cl100k()?),
            Self::O200k => Box::new(BpeEstimator::o200k()?),
        })
    }
}

/// Character-count heuristic: `ceil(chars / chars_per_token)`
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f32,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4.0 }
    }
}

impl CharRatioEstimator {
    /// Create an estimator with a custom ratio (clamped to at least 1.0)
    pub fn with_ratio(chars_per_token: f32) -> Self {
        Self { chars_per_token: chars_per_token.max(1.0) }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f32;
        (chars / self.chars_per_token).ceil().max(1.0) as u32
    }

    fn name(&self) -> &'static str {
        "chars"
    }
}

/// Exact BPE token counts through tiktoken
pub struct BpeEstimator {
    bpe: CoreBPE,
    name: &'static str,
}

impl BpeEstimator {
    /// cl100k_base encoding (GPT-4 / GPT-3.5 Turbo)
    pub fn cl100k() -> Result<Self, TokenizerError> {
        let bpe = cl100k_base().map_err(|e| TokenizerError::Init {
            encoding: "cl100k_base",
            message: e.to_string(),
        })?;
        Ok(Self { bpe, name: "cl100k" })
    }

    /// o200k_base encoding (GPT-4o)
    pub fn o200k() -> Result<Self, TokenizerError> {
        let bpe = o200k_base().map_err(|e| TokenizerError::Init {
            encoding: "o200k_base",
            message: e.to_string(),
        })?;
        Ok(Self { bpe, name: "o200k" })
    }
}

impl TokenEstimator for BpeEstimator {
    fn estimate(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len() as u32
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Truncate text to fit within a token budget
///
/// The cut always lands on a sentence (or line) boundary; when not even the
/// first sentence fits, it falls back to a word boundary. Never cuts inside
/// a word and never returns more than the input.
pub fn truncate_to_tokens<'a>(
    text: &'a str,
    budget: u32,
    estimator: &dyn TokenEstimator,
) -> &'a str {
    if estimator.estimate(text) <= budget {
        return text;
    }
    if budget == 0 {
        return "";
    }

    let sentence_ends: Vec<usize> = text
        .split_sentence_bound_indices()
        .map(|(start, s)| start + s.len())
        .collect();
    let cut = longest_fitting(text, &sentence_ends, budget, estimator);
    if cut > 0 {
        return text[..cut].trim_end();
    }

    let word_ends: Vec<usize> = text
        .split_word_bound_indices()
        .filter(|(_, w)| w.chars().all(char::is_whitespace))
        .map(|(start, _)| start)
        .collect();
    let cut = longest_fitting(text, &word_ends, budget, estimator);
    text[..cut].trim_end()
}

/// Binary search for the largest boundary whose prefix fits the budget
fn longest_fitting(
    text: &str,
    boundaries: &[usize],
    budget: u32,
    estimator: &dyn TokenEstimator,
) -> usize {
    let mut low = 0usize;
    let mut high = boundaries.len();
    let mut best = 0usize;

    while low < high {
        let mid = low + (high - low) / 2;
        let end = boundaries[mid];
        if estimator.estimate(text[..end].trim_end()) <= budget {
            best = end;
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    best
}

/// Take at most `max_chars` characters, cut back to the last line break
pub fn head_slice(text: &str, max_chars: usize) -> &str {
    let end = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return text,
    };
    let slice = &text[..end];
    match slice.rfind('\n') {
        Some(nl) if nl > 0 => &slice[..nl],
        _ => slice,
    }
}
