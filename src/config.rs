// ⚙️ Pipeline Configuration
// Paths, KPI thresholds and lookup tables, loaded from TOML.
// Every field has a default so a partial file (or no file) is valid.

use crate::error::{PipelineError, Result};
use crate::theme::ThemeRule;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "Google Play";

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_reviews: PathBuf,
    pub cleaned_reviews: PathBuf,
    pub labeled_reviews: PathBuf,
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            raw_reviews: PathBuf::from("data/raw/reviews_raw.csv"),
            cleaned_reviews: PathBuf::from("data/processed/reviews_cleaned.csv"),
            labeled_reviews: PathBuf::from("data/processed/reviews_analyzed.csv"),
            database: PathBuf::from("data/reviews.db"),
        }
    }
}

/// Minimum row counts checked by the integrity verifier
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_total_reviews: i64,
    pub min_reviews_per_bank: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_total_reviews: 1000,
            min_reviews_per_bank: 400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Longer review text is truncated before it reaches the model
    pub max_input_chars: usize,

    /// Optional JSON word list replacing the bundled lexicon
    pub lexicon_path: Option<PathBuf>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        SentimentConfig {
            max_input_chars: 512,
            lexicon_path: None,
        }
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub thresholds: Thresholds,
    pub sentiment: SentimentConfig,

    /// Channel label stamped on reviews that arrive without one
    pub default_source: String,

    /// Bank code -> display name
    pub banks: BTreeMap<String, String>,

    /// Store package id -> bank code
    pub packages: BTreeMap<String, String>,

    /// Ordered theme rules; `None` uses the built-in table
    pub themes: Option<Vec<ThemeRule>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            paths: PathsConfig::default(),
            thresholds: Thresholds::default(),
            sentiment: SentimentConfig::default(),
            default_source: DEFAULT_SOURCE.to_string(),
            banks: default_bank_names(),
            packages: default_packages(),
            themes: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sentiment.max_input_chars == 0 {
            return Err(PipelineError::Config(
                "sentiment.max_input_chars must be greater than zero".to_string(),
            ));
        }
        if self.default_source.trim().is_empty() {
            return Err(PipelineError::Config(
                "default_source must not be empty".to_string(),
            ));
        }
        if let Some(themes) = &self.themes {
            if let Some(rule) = themes.iter().find(|r| r.keywords.is_empty()) {
                return Err(PipelineError::Config(format!(
                    "theme '{}' has no keywords",
                    rule.name
                )));
            }
        }
        Ok(())
    }
}

fn default_bank_names() -> BTreeMap<String, String> {
    [
        ("CBE", "Commercial Bank of Ethiopia"),
        ("BOA", "Bank of Abyssinia"),
        ("Dashen", "Dashen Bank"),
    ]
    .into_iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect()
}

fn default_packages() -> BTreeMap<String, String> {
    [
        ("com.combanketh.mobilebanking", "CBE"),
        ("com.boa.boaMobileBanking", "BOA"),
        ("com.dashen.dashensuperapp", "Dashen"),
    ]
    .into_iter()
    .map(|(package, code)| (package.to_string(), code.to_string()))
    .collect()
}
