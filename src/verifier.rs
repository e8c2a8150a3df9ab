// ✅ Integrity Verifier - post-load audit of the review store
//
// Read-only. Every check runs and is reported on its own; findings are
// advisory and never abort the pipeline unless the caller decides so.

use crate::config::Thresholds;
use crate::db;
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CHECK RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub observed: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankCheck {
    pub bank_id: String,
    pub review_count: i64,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Total review count against the KPI minimum
    pub total: CheckResult,
    /// Per-bank distribution; below the minimum is WARN for that bank only
    pub per_bank: Vec<BankCheck>,
    /// Rows without a sentiment label
    pub sentiment_completeness: CheckResult,
    /// Rows without a theme
    pub theme_completeness: CheckResult,
}

impl VerificationReport {
    /// True when no check is FAIL. Per-bank warnings do not count.
    pub fn passed(&self) -> bool {
        self.checks().all(|c| c.status != CheckStatus::Fail)
    }

    pub fn warnings(&self) -> Vec<&BankCheck> {
        self.per_bank
            .iter()
            .filter(|b| b.status == CheckStatus::Warn)
            .collect()
    }

    pub fn checks(&self) -> impl Iterator<Item = &CheckResult> {
        [
            &self.total,
            &self.sentiment_completeness,
            &self.theme_completeness,
        ]
        .into_iter()
    }

    pub fn summary(&self) -> String {
        let failed = self.checks().filter(|c| c.status == CheckStatus::Fail).count();
        format!(
            "Total: {} ({}), Banks below minimum: {}, Failed checks: {}",
            self.total.observed,
            self.total.status,
            self.warnings().len(),
            failed
        )
    }

    /// Emit one log line per finding at a level matching its status
    pub fn log(&self) {
        for check in self.checks() {
            log_status(check.status, &format!("{}: {}", check.name, check.message));
        }
        for bank in &self.per_bank {
            log_status(
                bank.status,
                &format!("  {}: {} reviews ({})", bank.bank_id, bank.review_count, bank.status),
            );
        }
    }
}

fn log_status(status: CheckStatus, line: &str) {
    match status {
        CheckStatus::Pass => log::info!("✅ {}", line),
        CheckStatus::Warn => log::warn!("⚠️ {}", line),
        CheckStatus::Fail => log::error!("❌ {}", line),
    }
}

// ============================================================================
// VERIFIER
// ============================================================================

pub fn verify(conn: &Connection, thresholds: &Thresholds) -> Result<VerificationReport> {
    let total_count = db::count_reviews(conn)?;
    let total = if total_count >= thresholds.min_total_reviews {
        CheckResult {
            name: "total_reviews".to_string(),
            status: CheckStatus::Pass,
            observed: total_count,
            message: format!(
                "{} reviews (minimum {})",
                total_count, thresholds.min_total_reviews
            ),
        }
    } else {
        CheckResult {
            name: "total_reviews".to_string(),
            status: CheckStatus::Fail,
            observed: total_count,
            message: format!(
                "{} reviews is below the minimum of {}",
                total_count, thresholds.min_total_reviews
            ),
        }
    };

    let per_bank = db::review_counts_by_bank(conn)?
        .into_iter()
        .map(|(bank_id, review_count)| BankCheck {
            status: if review_count >= thresholds.min_reviews_per_bank {
                CheckStatus::Pass
            } else {
                CheckStatus::Warn
            },
            bank_id,
            review_count,
        })
        .collect();

    let sentiment_completeness =
        completeness_check("sentiment_completeness", "sentiment label", db::count_missing_sentiment(conn)?);
    let theme_completeness =
        completeness_check("theme_completeness", "theme", db::count_missing_theme(conn)?);

    let report = VerificationReport {
        total,
        per_bank,
        sentiment_completeness,
        theme_completeness,
    };
    report.log();

    Ok(report)
}

fn completeness_check(name: &str, field: &str, missing: i64) -> CheckResult {
    if missing == 0 {
        CheckResult {
            name: name.to_string(),
            status: CheckStatus::Pass,
            observed: 0,
            message: format!("all reviews have a {}", field),
        }
    } else {
        CheckResult {
            name: name.to_string(),
            status: CheckStatus::Fail,
            observed: missing,
            message: format!("{} reviews are missing a {}", missing, field),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::db::{load_reviews, open_in_memory, LoadMode};
    use crate::review::{LabeledReview, SentimentLabel};
    use chrono::NaiveDate;

    fn dataset(per_bank: &[(&str, usize)]) -> Vec<LabeledReview> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        per_bank
            .iter()
            .flat_map(|(bank, n)| {
                (0..*n).map(move |i| LabeledReview {
                    review_text: format!("{} review {}", bank, i),
                    rating: (i % 5 + 1) as u8,
                    review_date: start,
                    bank_id: bank.to_string(),
                    source: "Google Play".to_string(),
                    sentiment_label: SentimentLabel::Positive,
                    sentiment_score: 0.8,
                    identified_theme: "General".to_string(),
                })
            })
            .collect()
    }

    fn loaded(per_bank: &[(&str, usize)]) -> Connection {
        let mut conn = open_in_memory().unwrap();
        load_reviews(
            &mut conn,
            &dataset(per_bank),
            &PipelineConfig::default().banks,
            LoadMode::Reset,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_total_pass_with_single_bank_warning() {
        let conn = loaded(&[("CBE", 600), ("BOA", 450), ("Dashen", 150)]);
        let report = verify(&conn, &Thresholds::default()).unwrap();

        assert_eq!(report.total.observed, 1200);
        assert_eq!(report.total.status, CheckStatus::Pass);
        assert_eq!(report.sentiment_completeness.status, CheckStatus::Pass);

        let warnings = report.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].bank_id, "Dashen");
        assert_eq!(warnings[0].review_count, 150);
        assert!(report.passed());
    }

    #[test]
    fn test_low_total_fails() {
        let conn = loaded(&[("CBE", 10)]);
        let report = verify(&conn, &Thresholds::default()).unwrap();

        assert_eq!(report.total.status, CheckStatus::Fail);
        assert!(!report.passed());
        // other checks still ran
        assert_eq!(report.per_bank.len(), 1);
        assert_eq!(report.sentiment_completeness.status, CheckStatus::Pass);
    }

    #[test]
    fn test_null_sentiment_fails_completeness() {
        let conn = loaded(&[("CBE", 3)]);
        conn.execute(
            "INSERT INTO reviews (bank_id, review_text, rating, review_date, identified_theme)
             VALUES ('CBE', 'unlabeled', 4, '2024-01-02', 'General')",
            [],
        )
        .unwrap();

        let thresholds = Thresholds {
            min_total_reviews: 1,
            min_reviews_per_bank: 1,
        };
        let report = verify(&conn, &thresholds).unwrap();

        assert_eq!(report.total.status, CheckStatus::Pass);
        assert_eq!(report.sentiment_completeness.status, CheckStatus::Fail);
        assert_eq!(report.sentiment_completeness.observed, 1);
        assert_eq!(report.theme_completeness.status, CheckStatus::Pass);
        assert!(!report.passed());
    }

    #[test]
    fn test_verify_does_not_mutate() {
        let conn = loaded(&[("CBE", 5)]);
        let before = db::get_all_reviews(&conn).unwrap();

        verify(&conn, &Thresholds::default()).unwrap();
        verify(&conn, &Thresholds::default()).unwrap();

        assert_eq!(db::get_all_reviews(&conn).unwrap(), before);
    }

    #[test]
    fn test_empty_store() {
        let conn = loaded(&[]);
        let report = verify(&conn, &Thresholds::default()).unwrap();

        assert_eq!(report.total.observed, 0);
        assert_eq!(report.total.status, CheckStatus::Fail);
        assert!(report.per_bank.is_empty());
        assert!(report.summary().contains("Total: 0 (FAIL)"));
    }
}
