// Bank Review Pipeline - Core Library
// Normalize, label, load and audit app store reviews for banking apps.

pub mod config;
pub mod db;
pub mod error;
pub mod insights;
pub mod normalizer;
pub mod pipeline;
pub mod review;
pub mod sentiment;
pub mod theme;
pub mod verifier;

// Re-export commonly used types
pub use config::{PipelineConfig, Thresholds};
pub use db::{
    Bank, LoadEvent, LoadMode, LoadResult, StoredReview,
    derive_banks, get_all_reviews, get_banks, insert_banks, insert_reviews,
    load_reviews, open_database, open_in_memory, open_read_only, reset_database, setup_database,
};
pub use error::{PipelineError, Result};
pub use insights::{BankInsight, render_report, summarize};
pub use normalizer::{NormalizationReport, NormalizationStats, Normalizer};
pub use pipeline::{Pipeline, RunSummary, label_reviews};
pub use review::{CanonicalReview, LabeledReview, RawReview, SentimentLabel};
pub use sentiment::{
    LexiconSentimentModel, SentimentAdapter, SentimentModel, SentimentPrediction,
};
pub use theme::{ThemeClassifier, ThemeRule, GENERAL_THEME};
pub use verifier::{BankCheck, CheckResult, CheckStatus, VerificationReport, verify};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
