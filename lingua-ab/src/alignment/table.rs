//! Per-chapter word alignment table
//!
//! An [`AlignmentTable`] is the precomputed mapping from each token of a
//! chapter script to its time range in the chapter audio. Tables are
//! validated once at construction and never mutated afterwards.

use super::AlignmentError;
use serde::{Deserialize, Serialize};

/// One aligned token
///
/// `text` is the literal token as produced by the aligner. It may be
/// whitespace, punctuation only, or carry escaped quote artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub text: String,
    /// Seconds from chapter start
    pub start: f64,
    /// Seconds from chapter start, `end >= start`
    pub end: f64,
    /// Confidence loss reported by the aligner (higher = less reliable)
    #[serde(default)]
    pub loss: f64,
}

impl WordSpan {
    pub fn new(text: impl Into<String>, start: f64, end: f64, loss: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            loss,
        }
    }
}

/// Wire shape accepted on deserialization, validated into [`AlignmentTable`]
#[derive(Debug, Deserialize)]
struct RawAlignmentTable {
    #[serde(alias = "fullText")]
    full_text: String,
    words: Vec<WordSpan>,
    #[serde(default, alias = "lossScore")]
    loss_score: Option<f64>,
}

impl TryFrom<RawAlignmentTable> for AlignmentTable {
    type Error = AlignmentError;

    fn try_from(raw: RawAlignmentTable) -> Result<Self, Self::Error> {
        AlignmentTable::new(raw.full_text, raw.words, raw.loss_score)
    }
}

/// Immutable alignment for one chapter
///
/// **Invariants** (checked by [`AlignmentTable::new`]):
/// - every `start`/`end` is finite and `end >= start`
/// - `words` is sorted non-decreasing by `start`
///
/// Overlapping and zero-length spans are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAlignmentTable")]
pub struct AlignmentTable {
    full_text: String,
    words: Vec<WordSpan>,
    loss_score: Option<f64>,
}

impl AlignmentTable {
    /// Build a table, rejecting data that breaks the invariants
    pub fn new(
        full_text: impl Into<String>,
        words: Vec<WordSpan>,
        loss_score: Option<f64>,
    ) -> Result<Self, AlignmentError> {
        validate_words(&words)?;
        Ok(Self {
            full_text: full_text.into(),
            words,
            loss_score,
        })
    }

    /// Table with no timed words, used when only the script is known
    pub fn unsynchronized(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            words: Vec::new(),
            loss_score: None,
        }
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn words(&self) -> &[WordSpan] {
        &self.words
    }

    pub fn loss_score(&self) -> Option<f64> {
        self.loss_score
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn validate_words(words: &[WordSpan]) -> Result<(), AlignmentError> {
    let mut previous_start = f64::NEG_INFINITY;

    for (i, word) in words.iter().enumerate() {
        if !word.start.is_finite() || !word.end.is_finite() {
            return Err(AlignmentError::Malformed(format!(
                "word {} ({:?}) has non-finite timing",
                i, word.text
            )));
        }
        if word.end < word.start {
            return Err(AlignmentError::Malformed(format!(
                "word {} ({:?}) has negative duration: start={} end={}",
                i, word.text, word.start, word.end
            )));
        }
        if word.start < previous_start {
            return Err(AlignmentError::Malformed(format!(
                "word {} ({:?}) starts at {} before previous start {}",
                i, word.text, word.start, previous_start
            )));
        }
        previous_start = word.start;
    }

    Ok(())
}
