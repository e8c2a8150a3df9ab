// 📊 Insight Aggregator
// Per-bank statistics over the labeled dataset, plus rule-based
// recommendations keyed on each bank's top pain point.

use crate::review::{LabeledReview, SentimentLabel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

pub const NONE_THEME: &str = "None";

// ============================================================================
// RECOMMENDATION RULES
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecommendationRule {
    pub theme: &'static str,
    pub actions: &'static [&'static str],
}

pub const RECOMMENDATION_RULES: &[RecommendationRule] = &[
    RecommendationRule {
        theme: "App Stability",
        actions: &[
            "CRITICAL: High volume of crash reports detected.",
            "ACTION: Halt feature rollouts and prioritize bug fixes.",
        ],
    },
    RecommendationRule {
        theme: "Account Access",
        actions: &[
            "HIGH: Users struggle to login (OTP/Password).",
            "ACTION: Implement Biometric Login to reduce OTP dependency.",
        ],
    },
    RecommendationRule {
        theme: "Transaction Issue",
        actions: &[
            "MEDIUM: Transaction speed is a friction point.",
            "ACTION: Add 'Skeleton Screens' to improve perceived performance.",
        ],
    },
];

pub const FALLBACK_RECOMMENDATION: &[&str] =
    &["Monitor UI feedback for specific navigation issues."];

pub fn recommend(pain_point: &str) -> Vec<String> {
    RECOMMENDATION_RULES
        .iter()
        .find(|rule| rule.theme == pain_point)
        .map(|rule| rule.actions)
        .unwrap_or(FALLBACK_RECOMMENDATION)
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// BANK INSIGHT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankInsight {
    pub bank_id: String,
    pub bank_name: String,
    pub review_count: usize,
    pub average_rating: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    /// Most frequent theme among NEGATIVE reviews, or "None"
    pub pain_point: String,
    /// Most frequent theme among POSITIVE reviews, or "None"
    pub driver: String,
    pub recommendations: Vec<String>,
}

/// One entry per known bank that has reviews in the dataset.
pub fn summarize(reviews: &[LabeledReview], bank_names: &BTreeMap<String, String>) -> Vec<BankInsight> {
    bank_names
        .iter()
        .filter_map(|(code, name)| {
            let bank_reviews: Vec<&LabeledReview> =
                reviews.iter().filter(|r| &r.bank_id == code).collect();
            if bank_reviews.is_empty() {
                log::debug!("No reviews for {}, skipping", code);
                return None;
            }

            let average_rating = bank_reviews.iter().map(|r| r.rating as f64).sum::<f64>()
                / bank_reviews.len() as f64;

            let themes_for = |label: SentimentLabel| {
                bank_reviews
                    .iter()
                    .filter(move |r| r.sentiment_label == label)
                    .map(|r| r.identified_theme.as_str())
            };

            let negative_count = themes_for(SentimentLabel::Negative).count();
            let positive_count = themes_for(SentimentLabel::Positive).count();
            let pain_point = most_frequent(themes_for(SentimentLabel::Negative))
                .unwrap_or(NONE_THEME)
                .to_string();
            let driver = most_frequent(themes_for(SentimentLabel::Positive))
                .unwrap_or(NONE_THEME)
                .to_string();
            let recommendations = recommend(&pain_point);

            Some(BankInsight {
                bank_id: code.clone(),
                bank_name: name.clone(),
                review_count: bank_reviews.len(),
                average_rating,
                positive_count,
                negative_count,
                pain_point,
                driver,
                recommendations,
            })
        })
        .collect()
}

/// Mode of the sequence; ties go to the value seen first.
pub fn most_frequent<'a, I>(values: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    // value -> (count, first index)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, idx)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

// ============================================================================
// REPORT
// ============================================================================

pub fn render_report(insights: &[BankInsight]) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "AUTOMATED STRATEGIC INSIGHTS REPORT");
    let _ = writeln!(out, "{}", rule);

    for insight in insights {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} ({})", insight.bank_name, insight.bank_id);
        let _ = writeln!(
            out,
            "   • Reviews: {} ({} positive, {} negative)",
            insight.review_count, insight.positive_count, insight.negative_count
        );
        let _ = writeln!(out, "   • Average Rating: {:.2}/5.0", insight.average_rating);
        let _ = writeln!(out, "   • Primary Pain Point: '{}'", insight.pain_point);
        let _ = writeln!(out, "   RECOMMENDATIONS:");
        for (i, action) in insight.recommendations.iter().enumerate() {
            let _ = writeln!(out, "      {}. {}", i + 1, action);
        }
        if insight.driver != NONE_THEME {
            let _ = writeln!(out, "   Key Driver: Users respond well to '{}'.", insight.driver);
        }
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================
