// 🏷️ Theme Classifier - Rules as Data
// Ordered keyword rules mapping review text to a single topic label.
// Rules are evaluated in declaration order and the first match wins.

use serde::{Deserialize, Serialize};

pub const GENERAL_THEME: &str = "General";

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRule {
    /// Theme label assigned on match
    pub name: String,

    /// Case-insensitive substrings
    pub keywords: Vec<String>,
}

impl ThemeRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        ThemeRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// `text_lower` must already be lower-cased
    fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|k| text_lower.contains(k.as_str()))
    }
}

/// The built-in theme table, in precedence order
pub fn default_rules() -> Vec<ThemeRule> {
    vec![
        ThemeRule::new(
            "Account Access",
            &["login", "password", "otp", "sms", "code", "block"],
        ),
        ThemeRule::new(
            "Transaction Issue",
            &["slow", "transfer", "failed", "pending", "network", "money"],
        ),
        ThemeRule::new("App Stability", &["crash", "close", "bug", "error", "open"]),
        ThemeRule::new("UI/UX", &["design", "interface", "easy", "hard", "color", "look"]),
        ThemeRule::new("Features", &["fingerprint", "telebirr", "update", "limit"]),
    ]
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ThemeClassifier {
    rules: Vec<ThemeRule>,
}

impl ThemeClassifier {
    /// Rules keep the order given; keywords are lower-cased once here.
    pub fn from_rules(rules: Vec<ThemeRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| ThemeRule {
                name: rule.name,
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        ThemeClassifier { rules }
    }

    pub fn classify(&self, text: &str) -> &str {
        let text_lower = text.to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&text_lower))
            .map(|rule| rule.name.as_str())
            .unwrap_or(GENERAL_THEME)
    }

    pub fn theme_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for ThemeClassifier {
    fn default() -> Self {
        Self::from_rules(default_rules())
    }
}

// ============================================================================
// TESTS
// ============================================================================
