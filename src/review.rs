// 📝 Review Records - raw, canonical and labeled shapes
// Plus the flat CSV artifacts written between pipeline stages.

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// RAW REVIEW (as acquired)
// ============================================================================

/// One record as written by the acquisition step.
/// Every field is optional here; the normalizer decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    #[serde(default, alias = "content")]
    pub review_text: Option<String>,

    /// Kept as text: exports often write "5.0" or leave it blank
    #[serde(default, alias = "score")]
    pub rating: Option<String>,

    #[serde(default, alias = "at")]
    pub review_date: Option<String>,

    /// Store package identifier
    #[serde(default, alias = "bank_package")]
    pub bank_id: Option<String>,

    /// Bank code
    #[serde(default)]
    pub bank_name: Option<String>,

    #[serde(default)]
    pub source: Option<String>,
}

/// Each inner slice lists accepted spellings of one required column
pub const RAW_REQUIRED_COLUMNS: &[&[&str]] = &[
    &["review_text", "content"],
    &["rating", "score"],
    &["review_date", "at"],
    &["bank_name", "bank_id", "bank_package"],
];

// ============================================================================
// CANONICAL REVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalReview {
    pub review_text: String,
    pub rating: u8,
    pub review_date: NaiveDate,
    pub bank_id: String,
    pub source: String,
}

pub const CANONICAL_COLUMNS: &[&str] = &["review_text", "rating", "review_date", "bank_id", "source"];

impl CanonicalReview {
    /// SHA-256 over the dedup triple (text, bank, date)
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.review_text, &self.bank_id, self.review_date)
    }
}

pub fn dedup_key(review_text: &str, bank_id: &str, review_date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(review_text.as_bytes());
    hasher.update([0x1f]);
    hasher.update(bank_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(review_date.format("%Y-%m-%d").to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// SENTIMENT LABEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POSITIVE" => Ok(SentimentLabel::Positive),
            "NEGATIVE" => Ok(SentimentLabel::Negative),
            other => Err(format!("unknown sentiment label: {}", other)),
        }
    }
}

// ============================================================================
// LABELED REVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledReview {
    pub review_text: String,
    pub rating: u8,
    pub review_date: NaiveDate,
    pub bank_id: String,
    pub source: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub identified_theme: String,
}

pub const LABELED_COLUMNS: &[&str] = &[
    "review_text",
    "rating",
    "review_date",
    "bank_id",
    "source",
    "sentiment_label",
    "sentiment_score",
    "identified_theme",
];

impl LabeledReview {
    pub fn from_canonical(
        review: CanonicalReview,
        sentiment_label: SentimentLabel,
        sentiment_score: f64,
        identified_theme: String,
    ) -> Self {
        LabeledReview {
            review_text: review.review_text,
            rating: review.rating,
            review_date: review.review_date,
            bank_id: review.bank_id,
            source: review.source,
            sentiment_label,
            sentiment_score,
            identified_theme,
        }
    }

    pub fn canonical(&self) -> CanonicalReview {
        CanonicalReview {
            review_text: self.review_text.clone(),
            rating: self.rating,
            review_date: self.review_date,
            bank_id: self.bank_id.clone(),
            source: self.source.clone(),
        }
    }
}

// ============================================================================
// CSV ARTIFACTS
// ============================================================================

/// Read the raw acquisition file. Fails fast when the file is absent
/// or a required column group has no matching header.
pub fn read_raw_reviews(path: &Path) -> Result<Vec<RawReview>> {
    let mut rdr = open_reader(path)?;

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = RAW_REQUIRED_COLUMNS
        .iter()
        .filter(|group| !group.iter().any(|name| headers.iter().any(|h| h == *name)))
        .map(|group| group.join("|"))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    collect_rows(&mut rdr)
}

pub fn read_canonical_reviews(path: &Path) -> Result<Vec<CanonicalReview>> {
    read_table(path, CANONICAL_COLUMNS)
}

pub fn read_labeled_reviews(path: &Path) -> Result<Vec<LabeledReview>> {
    read_table(path, LABELED_COLUMNS)
}

pub fn write_canonical_reviews(path: &Path, reviews: &[CanonicalReview]) -> Result<()> {
    write_table(path, reviews)
}

pub fn write_labeled_reviews(path: &Path, reviews: &[LabeledReview]) -> Result<()> {
    write_table(path, reviews)
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    if !path.exists() {
        return Err(PipelineError::SourceUnavailable {
            path: path.to_path_buf(),
        });
    }
    Ok(csv::Reader::from_path(path)?)
}

fn read_table<T: DeserializeOwned>(path: &Path, columns: &[&str]) -> Result<Vec<T>> {
    let mut rdr = open_reader(path)?;

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = columns
        .iter()
        .filter(|name| !headers.iter().any(|h| h == **name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    collect_rows(&mut rdr)
}

fn collect_rows<T: DeserializeOwned>(rdr: &mut csv::Reader<fs::File>) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
