// 🗄️ Review Store - banks + reviews in SQLite
//
// Only this module talks SQL. Banks are always written before the reviews
// that reference them, each step in its own transaction, with foreign keys
// enforced by the connection.

use crate::error::{PipelineError, Result};
use crate::review::{LabeledReview, SentimentLabel};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

pub const UNKNOWN_BANK_NAME: &str = "Unknown";

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub bank_id: String,
    pub bank_name: String,
}

/// A persisted review row. Classification columns are nullable in the
/// store, so they are optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReview {
    pub review_id: i64,
    pub bank_id: String,
    pub review_text: String,
    pub rating: u8,
    pub review_date: NaiveDate,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_score: Option<f64>,
    pub identified_theme: Option<String>,
    pub source: Option<String>,
}

impl StoredReview {
    /// `None` when any classification field is missing
    pub fn to_labeled(&self, default_source: &str) -> Option<LabeledReview> {
        Some(LabeledReview {
            review_text: self.review_text.clone(),
            rating: self.rating,
            review_date: self.review_date,
            bank_id: self.bank_id.clone(),
            source: self
                .source
                .clone()
                .unwrap_or_else(|| default_source.to_string()),
            sentiment_label: self.sentiment_label?,
            sentiment_score: self.sentiment_score?,
            identified_theme: self.identified_theme.clone()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Drop reviews, drop banks, recreate, then load
    Reset,
    /// Create tables if missing and add rows to what is there
    Append,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Reset => "reset",
            LoadMode::Append => "append",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub run_id: String,
    pub mode: LoadMode,
    pub banks_inserted: usize,
    pub reviews_inserted: usize,
}

/// Audit row written after every completed load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub banks_inserted: i64,
    pub reviews_inserted: i64,
}

// ============================================================================
// CONNECTION + SCHEMA
// ============================================================================

pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Open an existing database without write access. Leaves the file,
/// its journal mode and its directory untouched.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )?;
    Ok(conn)
}

/// Open an in-memory database (used in tests).
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS banks (
            bank_id TEXT PRIMARY KEY,
            bank_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reviews (
            review_id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_id TEXT NOT NULL REFERENCES banks(bank_id),
            review_text TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            review_date TEXT NOT NULL,
            sentiment_label TEXT,
            sentiment_score REAL,
            identified_theme TEXT,
            source TEXT
        );

        CREATE TABLE IF NOT EXISTS load_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            mode TEXT NOT NULL,
            banks_inserted INTEGER NOT NULL,
            reviews_inserted INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_bank ON reviews(bank_id);",
    )?;

    Ok(())
}

/// Drop the dependent table before its parent, then recreate both.
pub fn reset_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS reviews;
         DROP TABLE IF EXISTS banks;",
    )?;
    setup_database(conn)?;
    log::info!("Reset banks and reviews tables");
    Ok(())
}

// ============================================================================
// LOAD
// ============================================================================

/// Distinct bank codes in the dataset, named through the lookup table.
pub fn derive_banks(reviews: &[LabeledReview], bank_names: &BTreeMap<String, String>) -> Vec<Bank> {
    let codes: BTreeSet<&str> = reviews.iter().map(|r| r.bank_id.as_str()).collect();

    codes
        .into_iter()
        .map(|code| Bank {
            bank_id: code.to_string(),
            bank_name: bank_names
                .get(code)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_BANK_NAME.to_string()),
        })
        .collect()
}

/// Insert banks in one transaction. Banks already present are kept.
pub fn insert_banks(conn: &mut Connection, banks: &[Bank]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO banks (bank_id, bank_name) VALUES (?1, ?2)")?;
        for bank in banks {
            inserted += stmt.execute(params![bank.bank_id, bank.bank_name])?;
        }
    }
    tx.commit()?;

    Ok(inserted)
}

/// Insert reviews in one transaction. A review whose bank is not in the
/// store is a `ReferentialViolation` and nothing is written.
pub fn insert_reviews(conn: &mut Connection, reviews: &[LabeledReview]) -> Result<usize> {
    let known: HashSet<String> = get_banks(conn)?.into_iter().map(|b| b.bank_id).collect();
    if let Some(orphan) = reviews.iter().find(|r| !known.contains(&r.bank_id)) {
        return Err(PipelineError::ReferentialViolation {
            bank_id: orphan.bank_id.clone(),
        });
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO reviews (
                bank_id, review_text, rating, review_date,
                sentiment_label, sentiment_score, identified_theme, source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for review in reviews {
            stmt.execute(params![
                review.bank_id,
                review.review_text,
                review.rating,
                review.review_date.format(DATE_FORMAT).to_string(),
                review.sentiment_label.as_str(),
                review.sentiment_score,
                review.identified_theme,
                review.source,
            ])?;
        }
    }
    tx.commit()?;

    Ok(reviews.len())
}

/// Full load: prepare schema per `mode`, banks, then reviews.
/// Any step failure stops the run and leaves the last completed step in place.
pub fn load_reviews(
    conn: &mut Connection,
    reviews: &[LabeledReview],
    bank_names: &BTreeMap<String, String>,
    mode: LoadMode,
) -> Result<LoadResult> {
    let run_id = uuid::Uuid::new_v4().to_string();
    log::info!("[{}] Loading {} reviews ({} mode)", run_id, reviews.len(), mode.as_str());

    match mode {
        LoadMode::Reset => reset_database(conn)?,
        LoadMode::Append => setup_database(conn)?,
    }

    let banks = derive_banks(reviews, bank_names);
    let banks_inserted = insert_banks(conn, &banks)?;
    log::info!("[{}] Inserted {} of {} banks", run_id, banks_inserted, banks.len());

    let reviews_inserted = insert_reviews(conn, reviews)?;
    log::info!("[{}] Inserted {} reviews", run_id, reviews_inserted);

    let result = LoadResult {
        run_id,
        mode,
        banks_inserted,
        reviews_inserted,
    };
    record_load_event(conn, &result)?;

    Ok(result)
}

fn record_load_event(conn: &Connection, result: &LoadResult) -> Result<()> {
    conn.execute(
        "INSERT INTO load_events (event_id, timestamp, mode, banks_inserted, reviews_inserted)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            result.run_id,
            Utc::now().to_rfc3339(),
            result.mode.as_str(),
            result.banks_inserted as i64,
            result.reviews_inserted as i64,
        ],
    )?;
    Ok(())
}

// ============================================================================
// READ
// ============================================================================

pub fn get_banks(conn: &Connection) -> Result<Vec<Bank>> {
    let mut stmt = conn.prepare("SELECT bank_id, bank_name FROM banks ORDER BY bank_id")?;

    let banks = stmt
        .query_map([], |row| {
            Ok(Bank {
                bank_id: row.get(0)?,
                bank_name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(banks)
}

pub fn get_all_reviews(conn: &Connection) -> Result<Vec<StoredReview>> {
    let mut stmt = conn.prepare(
        "SELECT review_id, bank_id, review_text, rating, review_date,
                sentiment_label, sentiment_score, identified_theme, source
         FROM reviews
         ORDER BY review_id",
    )?;

    let reviews = stmt
        .query_map([], stored_review_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(reviews)
}

fn stored_review_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReview> {
    let date_str: String = row.get(4)?;
    let review_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    let label_str: Option<String> = row.get(5)?;
    let sentiment_label = label_str
        .map(|s| s.parse::<SentimentLabel>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(StoredReview {
        review_id: row.get(0)?,
        bank_id: row.get(1)?,
        review_text: row.get(2)?,
        rating: row.get(3)?,
        review_date,
        sentiment_label,
        sentiment_score: row.get(6)?,
        identified_theme: row.get(7)?,
        source: row.get(8)?,
    })
}

pub fn count_reviews(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
    Ok(count)
}

/// (bank_id, review count), ordered by bank_id
pub fn review_counts_by_bank(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT bank_id, COUNT(*) FROM reviews GROUP BY bank_id ORDER BY bank_id",
    )?;

    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(counts)
}

pub fn count_missing_sentiment(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE sentiment_label IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_missing_theme(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE identified_theme IS NULL OR identified_theme = ''",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_load_events(conn: &Connection) -> Result<Vec<LoadEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, mode, banks_inserted, reviews_inserted
         FROM load_events
         ORDER BY id",
    )?;

    let events = stmt
        .query_map([], |row| {
            let timestamp_str: String = row.get(1)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                .with_timezone(&Utc);

            Ok(LoadEvent {
                event_id: row.get(0)?,
                timestamp,
                mode: row.get(2)?,
                banks_inserted: row.get(3)?,
                reviews_inserted: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn labeled(text: &str, bank: &str, rating: u8, label: SentimentLabel) -> LabeledReview {
        LabeledReview {
            review_text: text.to_string(),
            rating,
            review_date: NaiveDate::from_ymd_opt(2024, 4, 12).unwrap(),
            bank_id: bank.to_string(),
            source: "Google Play".to_string(),
            sentiment_label: label,
            sentiment_score: 0.91,
            identified_theme: "General".to_string(),
        }
    }

    fn sample() -> Vec<LabeledReview> {
        vec![
            labeled("Great app", "CBE", 5, SentimentLabel::Positive),
            labeled("Slow transfers", "BOA", 2, SentimentLabel::Negative),
            labeled("Keeps crashing", "BOA", 1, SentimentLabel::Negative),
            labeled("New bank app", "XYZ", 4, SentimentLabel::Positive),
        ]
    }

    #[test]
    fn test_derive_banks_maps_names_with_unknown_fallback() {
        let banks = derive_banks(&sample(), &PipelineConfig::default().banks);

        assert_eq!(
            banks,
            vec![
                Bank {
                    bank_id: "BOA".to_string(),
                    bank_name: "Bank of Abyssinia".to_string()
                },
                Bank {
                    bank_id: "CBE".to_string(),
                    bank_name: "Commercial Bank of Ethiopia".to_string()
                },
                Bank {
                    bank_id: "XYZ".to_string(),
                    bank_name: UNKNOWN_BANK_NAME.to_string()
                },
            ]
        );
    }

    #[test]
    fn test_load_inserts_banks_then_reviews() {
        let mut conn = open_in_memory().unwrap();
        let result = load_reviews(
            &mut conn,
            &sample(),
            &PipelineConfig::default().banks,
            LoadMode::Reset,
        )
        .unwrap();

        assert_eq!(result.banks_inserted, 3);
        assert_eq!(result.reviews_inserted, 4);
        assert_eq!(count_reviews(&conn).unwrap(), 4);
        assert_eq!(
            review_counts_by_bank(&conn).unwrap(),
            vec![
                ("BOA".to_string(), 2),
                ("CBE".to_string(), 1),
                ("XYZ".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_review_for_missing_bank_fails_whole_batch() {
        let mut conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        // Only CBE exists
        insert_banks(
            &mut conn,
            &[Bank {
                bank_id: "CBE".to_string(),
                bank_name: "Commercial Bank of Ethiopia".to_string(),
            }],
        )
        .unwrap();

        let result = insert_reviews(&mut conn, &sample());

        match result {
            Err(PipelineError::ReferentialViolation { bank_id }) => assert_eq!(bank_id, "BOA"),
            other => panic!("expected ReferentialViolation, got {:?}", other),
        }
        assert_eq!(count_reviews(&conn).unwrap(), 0);
    }

    #[test]
    fn test_foreign_key_enforced_by_store() {
        let conn = open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO reviews (bank_id, review_text, rating, review_date)
             VALUES ('NOPE', 'x', 3, '2024-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reset_replaces_previous_load() {
        let mut conn = open_in_memory().unwrap();
        let names = PipelineConfig::default().banks;

        load_reviews(&mut conn, &sample(), &names, LoadMode::Reset).unwrap();
        load_reviews(&mut conn, &sample()[..2], &names, LoadMode::Reset).unwrap();

        assert_eq!(count_reviews(&conn).unwrap(), 2);
        assert_eq!(get_banks(&conn).unwrap().len(), 2);
        // review ids restart after the table is recreated
        assert_eq!(get_all_reviews(&conn).unwrap()[0].review_id, 1);
        // audit log survives resets
        assert_eq!(get_load_events(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_append_keeps_existing_rows_and_banks() {
        let mut conn = open_in_memory().unwrap();
        let names = PipelineConfig::default().banks;

        load_reviews(&mut conn, &sample()[..2], &names, LoadMode::Append).unwrap();
        let second = load_reviews(&mut conn, &sample(), &names, LoadMode::Append).unwrap();

        assert_eq!(second.banks_inserted, 1); // only XYZ is new
        assert_eq!(second.reviews_inserted, 4);
        assert_eq!(count_reviews(&conn).unwrap(), 6);

        let events = get_load_events(&conn).unwrap();
        assert_eq!(events[1].event_id, second.run_id);
        assert_eq!(events[1].mode, "append");
    }

    #[test]
    fn test_read_back_preserves_types() {
        let mut conn = open_in_memory().unwrap();
        let input = sample();
        load_reviews(&mut conn, &input, &PipelineConfig::default().banks, LoadMode::Reset).unwrap();

        let stored = get_all_reviews(&conn).unwrap();
        let back: Vec<LabeledReview> = stored
            .iter()
            .map(|r| r.to_labeled("Google Play").unwrap())
            .collect();

        assert_eq!(back, input);
    }

    #[test]
    fn test_null_classification_reads_as_none() {
        let mut conn = open_in_memory().unwrap();
        load_reviews(&mut conn, &sample()[..1], &PipelineConfig::default().banks, LoadMode::Reset)
            .unwrap();
        conn.execute(
            "INSERT INTO reviews (bank_id, review_text, rating, review_date)
             VALUES ('CBE', 'unlabeled', 3, '2024-01-01')",
            [],
        )
        .unwrap();

        let stored = get_all_reviews(&conn).unwrap();
        assert_eq!(stored[1].sentiment_label, None);
        assert!(stored[1].to_labeled("Google Play").is_none());
        assert_eq!(count_missing_sentiment(&conn).unwrap(), 1);
        assert_eq!(count_missing_theme(&conn).unwrap(), 1);
    }
}
