// 🔗 Pipeline Stages
// raw CSV -> cleaned CSV -> labeled CSV -> store -> audit -> insights
// Each stage reads the previous stage's artifact in full before running.

use crate::config::PipelineConfig;
use crate::db::{self, LoadMode, LoadResult};
use crate::error::{PipelineError, Result};
use crate::insights::{self, BankInsight};
use crate::normalizer::{NormalizationStats, Normalizer};
use crate::review::{self, CanonicalReview, LabeledReview};
use crate::sentiment::{LexiconSentimentModel, SentimentAdapter};
use crate::theme::{self, ThemeClassifier};
use crate::verifier::{self, VerificationReport};

/// Attach sentiment and theme to every review. 1:1, order preserved;
/// the first classifier failure aborts the whole batch.
pub fn label_reviews(
    reviews: Vec<CanonicalReview>,
    adapter: &SentimentAdapter,
    themes: &ThemeClassifier,
) -> Result<Vec<LabeledReview>> {
    reviews
        .into_iter()
        .map(|review| {
            let (label, score) = adapter.score(&review.review_text)?;
            let theme = themes.classify(&review.review_text).to_string();
            Ok(LabeledReview::from_canonical(review, label, score, theme))
        })
        .collect()
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn theme_classifier(&self) -> ThemeClassifier {
        let rules = self
            .config
            .themes
            .clone()
            .unwrap_or_else(theme::default_rules);
        ThemeClassifier::from_rules(rules)
    }

    /// Build the adapter over the configured model. A lexicon that cannot
    /// be loaded is `ClassifierUnavailable`.
    pub fn sentiment_adapter(&self) -> Result<SentimentAdapter> {
        let model = match &self.config.sentiment.lexicon_path {
            Some(path) => LexiconSentimentModel::from_file(path)?,
            None => LexiconSentimentModel::default(),
        };
        Ok(SentimentAdapter::new(
            Box::new(model),
            self.config.sentiment.max_input_chars,
        ))
    }

    // ========================================================================
    // STAGES
    // ========================================================================

    /// Raw reviews -> cleaned canonical dataset
    pub fn preprocess(&self) -> Result<NormalizationStats> {
        let paths = &self.config.paths;
        log::info!("Loading raw reviews from {}", paths.raw_reviews.display());
        let raw = review::read_raw_reviews(&paths.raw_reviews)?;

        let report = Normalizer::from_config(&self.config).normalize(&raw);
        review::write_canonical_reviews(&paths.cleaned_reviews, &report.reviews)?;
        log::info!("Cleaned data saved to {}", paths.cleaned_reviews.display());

        Ok(report.stats)
    }

    /// Cleaned dataset -> labeled dataset
    pub fn analyze(&self, adapter: &SentimentAdapter) -> Result<usize> {
        let paths = &self.config.paths;
        let canonical = review::read_canonical_reviews(&paths.cleaned_reviews)?;
        log::info!(
            "Analyzing {} reviews with the {} model",
            canonical.len(),
            adapter.model_name()
        );

        let labeled = label_reviews(canonical, adapter, &self.theme_classifier())?;
        review::write_labeled_reviews(&paths.labeled_reviews, &labeled)?;
        log::info!("Labeled data saved to {}", paths.labeled_reviews.display());

        Ok(labeled.len())
    }

    /// Labeled dataset -> store
    pub fn load(&self, mode: LoadMode) -> Result<LoadResult> {
        let paths = &self.config.paths;
        let labeled = review::read_labeled_reviews(&paths.labeled_reviews)?;
        log::info!("Loaded {} rows from {}", labeled.len(), paths.labeled_reviews.display());

        let mut conn = db::open_database(&paths.database)?;
        db::load_reviews(&mut conn, &labeled, &self.config.banks, mode)
    }

    /// Audit the store without writing to it. The database must already exist.
    pub fn verify(&self) -> Result<VerificationReport> {
        let path = &self.config.paths.database;
        if !path.exists() {
            return Err(PipelineError::SourceUnavailable { path: path.clone() });
        }

        let conn = db::open_read_only(path)?;
        let report = verifier::verify(&conn, &self.config.thresholds)?;
        log::info!("Integrity check: {}", report.summary());
        Ok(report)
    }

    pub fn insights(&self) -> Result<Vec<BankInsight>> {
        let labeled = review::read_labeled_reviews(&self.config.paths.labeled_reviews)?;
        Ok(insights::summarize(&labeled, &self.config.banks))
    }

    /// Every stage in order. A model that fails to load stops the run
    /// before anything is labeled or loaded.
    pub fn run(&self, mode: LoadMode) -> Result<RunSummary> {
        let normalization = self.preprocess()?;
        let adapter = self.sentiment_adapter()?;
        let labeled = self.analyze(&adapter)?;
        let load = self.load(mode)?;
        let verification = self.verify()?;
        let insights = self.insights()?;

        Ok(RunSummary {
            normalization,
            labeled,
            load,
            verification,
            insights,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub normalization: NormalizationStats,
    pub labeled: usize,
    pub load: LoadResult,
    pub verification: VerificationReport,
    pub insights: Vec<BankInsight>,
}
