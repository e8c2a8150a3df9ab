// 💬 Sentiment Adapter
// Stable interface over an external sentiment model. Text is truncated to a
// fixed character budget before submission; long input is never rejected.

use crate::error::{PipelineError, Result};
use crate::review::SentimentLabel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// MODEL CONTRACT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPrediction {
    pub label: SentimentLabel,
    /// Model confidence in [0, 1]
    pub confidence: f64,
}

/// A pretrained sentiment classifier.
///
/// Implementations may block (network, inference); the adapter is the only
/// caller, so timeouts or retries can wrap this trait without touching the
/// rest of the pipeline.
pub trait SentimentModel: Send + Sync {
    fn predict(&self, text: &str) -> anyhow::Result<SentimentPrediction>;

    /// Model identifier for logs
    fn name(&self) -> &str;
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct SentimentAdapter {
    model: Box<dyn SentimentModel>,
    max_input_chars: usize,
}

impl SentimentAdapter {
    pub fn new(model: Box<dyn SentimentModel>, max_input_chars: usize) -> Self {
        SentimentAdapter {
            model,
            max_input_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score one text. Any model failure or out-of-contract output is
    /// `ClassifierUnavailable`.
    pub fn score(&self, text: &str) -> Result<(SentimentLabel, f64)> {
        let input = truncate_chars(text, self.max_input_chars);

        let prediction = self.model.predict(input).map_err(|e| {
            PipelineError::ClassifierUnavailable(format!("{} failed: {:#}", self.model.name(), e))
        })?;

        if !(0.0..=1.0).contains(&prediction.confidence) {
            return Err(PipelineError::ClassifierUnavailable(format!(
                "{} returned confidence {} outside [0, 1]",
                self.model.name(),
                prediction.confidence
            )));
        }

        Ok((prediction.label, prediction.confidence))
    }

    /// Score every text in order; the first failure aborts the batch.
    pub fn score_batch<'a, I>(&self, texts: I) -> Result<Vec<(SentimentLabel, f64)>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts.into_iter().map(|text| self.score(text)).collect()
    }
}

/// Cut at a char boundary, never inside a multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// ============================================================================
// LEXICON MODEL
// ============================================================================

/// Word-list classifier bundled with the crate.
///
/// Counts positive and negative tokens; ties go to POSITIVE at 0.5.
/// Otherwise confidence = 0.5 + 0.5 * |pos - neg| / (pos + neg).
pub struct LexiconSentimentModel {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl LexiconSentimentModel {
    pub fn new<I, J, S, T>(positive: I, negative: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        LexiconSentimentModel {
            positive: positive.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
            negative: negative.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    /// Load a `{"positive": [...], "negative": [...]}` word list
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::ClassifierUnavailable(format!(
                "cannot read lexicon {}: {}",
                path.display(),
                e
            ))
        })?;

        let lexicon: LexiconFile = serde_json::from_str(&content).map_err(|e| {
            PipelineError::ClassifierUnavailable(format!(
                "cannot parse lexicon {}: {}",
                path.display(),
                e
            ))
        })?;

        if lexicon.positive.is_empty() || lexicon.negative.is_empty() {
            return Err(PipelineError::ClassifierUnavailable(format!(
                "lexicon {} needs both positive and negative words",
                path.display()
            )));
        }

        Ok(Self::new(lexicon.positive, lexicon.negative))
    }

    fn count_hits(&self, text: &str) -> (usize, usize) {
        let lower = text.to_lowercase();
        let tokens = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty());

        tokens.fold((0, 0), |(pos, neg), token| {
            (
                pos + self.positive.contains(token) as usize,
                neg + self.negative.contains(token) as usize,
            )
        })
    }
}

impl Default for LexiconSentimentModel {
    fn default() -> Self {
        Self::new(
            [
                "good", "great", "excellent", "best", "love", "nice", "amazing", "awesome",
                "easy", "fast", "helpful", "perfect", "wonderful", "thanks", "thank", "smooth",
                "reliable", "convenient", "useful", "fantastic", "satisfied", "simple", "cool",
                "super", "efficient", "secure", "recommend",
            ],
            [
                "bad", "worst", "poor", "slow", "crash", "crashes", "crashing", "error",
                "errors", "fail", "failed", "fails", "failure", "bug", "bugs", "terrible",
                "horrible", "awful", "useless", "problem", "problems", "issue", "issues",
                "disappointed", "disappointing", "hate", "annoying", "stuck", "waste",
                "broken", "not", "never", "can't", "cannot", "doesn't", "don't", "won't",
            ],
        )
    }
}

impl SentimentModel for LexiconSentimentModel {
    fn predict(&self, text: &str) -> anyhow::Result<SentimentPrediction> {
        let (pos, neg) = self.count_hits(text);

        if pos == neg {
            return Ok(SentimentPrediction {
                label: SentimentLabel::Positive,
                confidence: 0.5,
            });
        }

        let margin = pos.abs_diff(neg) as f64 / (pos + neg) as f64;
        let label = if pos > neg {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        };

        Ok(SentimentPrediction {
            label,
            confidence: (0.5 + 0.5 * margin).clamp(0.0, 1.0),
        })
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

// ============================================================================
// TESTS
// ============================================================================
