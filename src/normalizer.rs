// 🧹 Normalizer - raw store records -> canonical dataset
//
// Each record passes a sequence of hard gates; anything failing a gate is
// dropped and counted, never nulled:
//   1. text and rating present
//   2. rating is an integer 1-5, timestamp parses, bank resolves
//   3. exact dedup on (review_text, bank_id, review_date)
// Survivors get a calendar date and a source channel stamp.

use crate::config::PipelineConfig;
use crate::review::{CanonicalReview, RawReview, CANONICAL_COLUMNS};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub original_count: usize,
    /// Missing text or rating
    pub dropped_missing: usize,
    /// Rating out of range, unparseable timestamp or blank bank
    pub dropped_invalid: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
    /// Highest per-column share of missing values in the output (0.0 - 1.0)
    pub max_missing_fraction: f64,
}

impl NormalizationStats {
    pub fn removed(&self) -> usize {
        self.original_count - self.final_count
    }

    pub fn missing_percentage(&self) -> f64 {
        self.max_missing_fraction * 100.0
    }

    pub fn summary(&self) -> String {
        format!(
            "Original: {}, Final: {}, Removed: {} ({} missing, {} invalid, {} duplicates), Missing data: {:.2}%",
            self.original_count,
            self.final_count,
            self.removed(),
            self.dropped_missing,
            self.dropped_invalid,
            self.duplicates_removed,
            self.missing_percentage()
        )
    }
}

#[derive(Debug, Clone)]
pub struct NormalizationReport {
    pub reviews: Vec<CanonicalReview>,
    pub stats: NormalizationStats,
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    /// Store package id -> bank code
    packages: BTreeMap<String, String>,
    default_source: String,
}

impl Normalizer {
    pub fn new(packages: BTreeMap<String, String>, default_source: &str) -> Self {
        Normalizer {
            packages,
            default_source: default_source.to_string(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.packages.clone(), &config.default_source)
    }

    pub fn normalize(&self, raw: &[RawReview]) -> NormalizationReport {
        let mut stats = NormalizationStats {
            original_count: raw.len(),
            ..Default::default()
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut reviews = Vec::new();

        for record in raw {
            // Gate 1: required fields
            let (text, rating) = match (non_blank(&record.review_text), non_blank(&record.rating)) {
                (Some(_), Some(rating)) => (record.review_text.as_deref().unwrap_or_default(), rating),
                _ => {
                    stats.dropped_missing += 1;
                    continue;
                }
            };

            // Gate 2: field validity
            let rating = match parse_rating(rating) {
                Some(r) => r,
                None => {
                    stats.dropped_invalid += 1;
                    continue;
                }
            };
            let review_date = match non_blank(&record.review_date).and_then(parse_review_date) {
                Some(d) => d,
                None => {
                    stats.dropped_invalid += 1;
                    continue;
                }
            };
            let bank_id = match self.resolve_bank(record) {
                Some(b) => b,
                None => {
                    stats.dropped_invalid += 1;
                    continue;
                }
            };

            let review = CanonicalReview {
                review_text: text.to_string(),
                rating,
                review_date,
                bank_id,
                source: non_blank(&record.source)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_source.clone()),
            };

            // Gate 3: exact duplicate
            if !seen.insert(review.dedup_key()) {
                stats.duplicates_removed += 1;
                continue;
            }

            reviews.push(review);
        }

        stats.final_count = reviews.len();
        stats.max_missing_fraction = max_missing_fraction(&reviews);

        log::info!("Normalization: {}", stats.summary());

        NormalizationReport { reviews, stats }
    }

    /// Bank code column wins; otherwise the package id is mapped,
    /// falling back to the raw identifier.
    fn resolve_bank(&self, record: &RawReview) -> Option<String> {
        if let Some(code) = non_blank(&record.bank_name) {
            return Some(code.to_string());
        }

        non_blank(&record.bank_id).map(|package| {
            self.packages
                .get(package)
                .cloned()
                .unwrap_or_else(|| package.to_string())
        })
    }
}

// ============================================================================
// FIELD PARSING
// ============================================================================

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Integer 1-5; "4.0" is accepted, "4.5" is not.
pub fn parse_rating(value: &str) -> Option<u8> {
    let value = value.trim();

    let rating = match value.parse::<i64>() {
        Ok(r) => r,
        Err(_) => {
            let f = value.parse::<f64>().ok()?;
            if !f.is_finite() || f.fract() != 0.0 {
                return None;
            }
            f as i64
        }
    };

    if (1..=5).contains(&rating) {
        Some(rating as u8)
    } else {
        None
    }
}

/// Parse a timestamp and drop the time of day.
pub fn parse_review_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
}

fn max_missing_fraction(reviews: &[CanonicalReview]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }

    let missing_per_column = [
        reviews.iter().filter(|r| r.review_text.trim().is_empty()).count(),
        0, // rating is typed
        0, // review_date is typed
        reviews.iter().filter(|r| r.bank_id.trim().is_empty()).count(),
        reviews.iter().filter(|r| r.source.trim().is_empty()).count(),
    ];
    debug_assert_eq!(missing_per_column.len(), CANONICAL_COLUMNS.len());

    missing_per_column
        .iter()
        .map(|&missing| missing as f64 / reviews.len() as f64)
        .fold(0.0, f64::max)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: Option<&str>, rating: Option<&str>, date: &str, bank: &str) -> RawReview {
        RawReview {
            review_text: text.map(String::from),
            rating: rating.map(String::from),
            review_date: Some(date.to_string()),
            bank_id: Some("com.example.pkg".to_string()),
            bank_name: Some(bank.to_string()),
            source: None,
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::from_config(&PipelineConfig::default())
    }

    #[test]
    fn test_drops_missing_text_or_rating() {
        let input = vec![
            raw(Some("good"), Some("5"), "2024-01-01", "CBE"),
            raw(None, Some("4"), "2024-01-01", "CBE"),
            raw(Some("   "), Some("4"), "2024-01-01", "CBE"),
            raw(Some("no rating"), None, "2024-01-01", "CBE"),
        ];

        let report = normalizer().normalize(&input);

        assert_eq!(report.reviews.len(), 1);
        assert_eq!(report.stats.dropped_missing, 3);
        assert_eq!(report.stats.removed(), 3);
    }

    #[test]
    fn test_every_output_has_text_and_valid_rating() {
        let input = vec![
            raw(Some("a"), Some("0"), "2024-01-01", "CBE"),
            raw(Some("b"), Some("6"), "2024-01-01", "CBE"),
            raw(Some("c"), Some("3.5"), "2024-01-01", "CBE"),
            raw(Some("d"), Some("abc"), "2024-01-01", "CBE"),
            raw(Some("e"), Some("4.0"), "2024-01-01", "CBE"),
            raw(Some("f"), Some("1"), "2024-01-01", "CBE"),
        ];

        let report = normalizer().normalize(&input);

        assert_eq!(report.stats.dropped_invalid, 4);
        assert_eq!(report.reviews.len(), 2);
        for review in &report.reviews {
            assert!(!review.review_text.is_empty());
            assert!((1..=5).contains(&review.rating));
        }
    }

    #[test]
    fn test_same_record_twice_yields_one() {
        let record = raw(Some("Great app"), Some("5"), "2024-03-10", "BOA");
        let report = normalizer().normalize(&[record.clone(), record]);

        assert_eq!(report.reviews.len(), 1);
        assert_eq!(report.stats.duplicates_removed, 1);
    }

    #[test]
    fn test_dedup_keeps_text_exactly_as_written() {
        let input = vec![
            raw(Some("Great app"), Some("5"), "2024-03-10", "BOA"),
            raw(Some("  Great app  "), Some("5"), "2024-03-10", "BOA"),
        ];

        let report = normalizer().normalize(&input);

        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.stats.duplicates_removed, 0);
        assert_eq!(report.reviews[1].review_text, "  Great app  ");
    }

    #[test]
    fn test_dedup_uses_calendar_date() {
        let input = vec![
            raw(Some("Great app"), Some("5"), "2024-03-10 08:00:00", "BOA"),
            raw(Some("Great app"), Some("4"), "2024-03-10 21:15:42", "BOA"),
            raw(Some("Great app"), Some("5"), "2024-03-11 08:00:00", "BOA"),
            raw(Some("Great app"), Some("5"), "2024-03-10 08:00:00", "CBE"),
        ];

        let report = normalizer().normalize(&input);

        assert_eq!(report.reviews.len(), 3);
        assert_eq!(report.stats.duplicates_removed, 1);
        // first occurrence wins
        assert_eq!(report.reviews[0].rating, 5);
    }

    #[test]
    fn test_bank_resolution_and_source_stamp() {
        let mut mapped = raw(Some("ok"), Some("3"), "2024-01-01", "");
        mapped.bank_name = None;
        mapped.bank_id = Some("com.dashen.dashensuperapp".to_string());

        let mut unmapped = raw(Some("ok"), Some("3"), "2024-01-01", "");
        unmapped.bank_name = None;
        unmapped.bank_id = Some("com.unknown.app".to_string());
        unmapped.source = Some("App Store".to_string());

        let mut blank = raw(Some("ok"), Some("3"), "2024-01-01", " ");
        blank.bank_id = None;

        let report = normalizer().normalize(&[mapped, unmapped, blank]);

        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.reviews[0].bank_id, "Dashen");
        assert_eq!(report.reviews[0].source, "Google Play");
        assert_eq!(report.reviews[1].bank_id, "com.unknown.app");
        assert_eq!(report.reviews[1].source, "App Store");
        assert_eq!(report.stats.dropped_invalid, 1);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        assert_eq!(parse_review_date("2024-06-30"), Some(expected));
        assert_eq!(parse_review_date("2024-06-30 23:59:59"), Some(expected));
        assert_eq!(parse_review_date("2024-06-30T01:02:03.456"), Some(expected));
        assert_eq!(parse_review_date("2024-06-30T10:00:00+03:00"), Some(expected));
        assert_eq!(parse_review_date("06/30/2024"), Some(expected));
        assert_eq!(parse_review_date("yesterday"), None);
    }

    #[test]
    fn test_unparseable_date_is_dropped() {
        let report = normalizer().normalize(&[raw(Some("x"), Some("2"), "not a date", "CBE")]);
        assert!(report.reviews.is_empty());
        assert_eq!(report.stats.dropped_invalid, 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = vec![
            raw(Some("one"), Some("1"), "2024-01-01", "CBE"),
            raw(Some("two"), Some("2"), "2024-01-02", "BOA"),
            raw(Some("one"), Some("1"), "2024-01-01", "CBE"),
        ];

        let first: HashSet<_> = normalizer().normalize(&input).reviews.into_iter().collect();
        let second: HashSet<_> = normalizer().normalize(&input).reviews.into_iter().collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_quality_metric() {
        let report = normalizer().normalize(&[raw(Some("x"), Some("2"), "2024-01-01", "CBE")]);
        assert_eq!(report.stats.max_missing_fraction, 0.0);
        assert_eq!(report.stats.final_count, 1);

        let empty = normalizer().normalize(&[]);
        assert_eq!(empty.stats.max_missing_fraction, 0.0);
        assert!(empty.stats.summary().contains("Original: 0"));
    }
}
