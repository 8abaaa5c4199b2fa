//! Metadata-only translation history backed by SQLite.
//! One row per request attempt; rows carry lengths, hashes, timings and
//! outcomes, never the text itself. Rows are written once and never
//! mutated or deleted by the request path.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

/// Terminal outcome of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Error => "error",
        }
    }
}

/// Row to insert for one request attempt.
#[derive(Debug, Clone)]
pub struct NewTranslation {
    pub user_id: String,
    pub source_lang: String,
    pub detected_source_lang: Option<String>,
    pub target_lang: String,
    pub chars_in: i64,
    pub provider: String,
    pub latency_ms: Option<i64>,
    pub status: RecordStatus,
    pub error_code: Option<String>,
    pub text_hash: String,
}

/// Persisted row as read back for history listings and export.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationRow {
    pub id: i64,
    pub created_at: i64,
    pub user_id: String,
    pub source_lang: String,
    pub detected_source_lang: Option<String>,
    pub target_lang: String,
    pub chars_in: i64,
    pub provider: String,
    pub latency_ms: Option<i64>,
    pub status: String,
    pub error_code: Option<String>,
    pub text_hash: String,
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, String> {
        let conn = Connection::open(db_path)
            .map_err(|e| format!("failed to open history DB: {e}"))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| format!("PRAGMA failed: {e}"))?;

        let store = Self::init(conn)?;
        info!(path = %db_path.display(), "history store opened");
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("failed to open in-memory history DB: {e}"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                detected_source_lang TEXT,
                target_lang TEXT NOT NULL,
                chars_in INTEGER NOT NULL,
                provider TEXT NOT NULL,
                latency_ms INTEGER,
                status TEXT NOT NULL,
                error_code TEXT,
                text_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_translations_user_created
                ON translations(user_id, created_at);",
        )
        .map_err(|e| format!("create translations table failed: {e}"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one metadata row. Callers on the translate path log a failure
    /// and keep going: the answer is worth more than the audit row.
    pub fn record(&self, row: &NewTranslation) -> Result<(), String> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO translations
             (created_at, user_id, source_lang, detected_source_lang, target_lang,
              chars_in, provider, latency_ms, status, error_code, text_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                now_unix(),
                row.user_id,
                row.source_lang,
                row.detected_source_lang,
                row.target_lang,
                row.chars_in,
                row.provider,
                row.latency_ms,
                row.status.as_str(),
                row.error_code,
                row.text_hash,
            ],
        )
        .map_err(|e| format!("history insert failed: {e}"))?;
        Ok(())
    }

    /// Newest-first rows for one user.
    pub fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<TranslationRow>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, created_at, user_id, source_lang, detected_source_lang,
                        target_lang, chars_in, provider, latency_ms, status,
                        error_code, text_hash
                 FROM translations
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(|e| format!("history query prepare failed: {e}"))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(TranslationRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    user_id: row.get(2)?,
                    source_lang: row.get(3)?,
                    detected_source_lang: row.get(4)?,
                    target_lang: row.get(5)?,
                    chars_in: row.get(6)?,
                    provider: row.get(7)?,
                    latency_ms: row.get(8)?,
                    status: row.get(9)?,
                    error_code: row.get(10)?,
                    text_hash: row.get(11)?,
                })
            })
            .map_err(|e| format!("history query failed: {e}"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("history row decode failed: {e}"))?;

        Ok(rows)
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_row(user_id: &str, provider: &str) -> NewTranslation {
        NewTranslation {
            user_id: user_id.to_string(),
            source_lang: "en".to_string(),
            detected_source_lang: Some("en".to_string()),
            target_lang: "pt".to_string(),
            chars_in: 5,
            provider: provider.to_string(),
            latency_ms: Some(120),
            status: RecordStatus::Success,
            error_code: None,
            text_hash: "abc123".to_string(),
        }
    }

    #[test]
    fn record_then_read_back() {
        let store = HistoryStore::open_in_memory().expect("store");
        store.record(&success_row("alice", "libretranslate")).expect("insert");

        let rows = store.recent_for_user("alice", 10).expect("query");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.user_id, "alice");
        assert_eq!(row.provider, "libretranslate");
        assert_eq!(row.latency_ms, Some(120));
        assert_eq!(row.status, "success");
        assert!(row.created_at > 0);
    }

    #[test]
    fn error_rows_keep_code_and_null_latency() {
        let store = HistoryStore::open_in_memory().expect("store");
        let mut row = success_row("alice", "libretranslate");
        row.status = RecordStatus::Error;
        row.latency_ms = None;
        row.error_code = Some("TIMEOUT".to_string());
        row.detected_source_lang = None;
        store.record(&row).expect("insert");

        let rows = store.recent_for_user("alice", 10).expect("query");
        assert_eq!(rows[0].status, "error");
        assert_eq!(rows[0].latency_ms, None);
        assert_eq!(rows[0].error_code.as_deref(), Some("TIMEOUT"));
    }

    #[test]
    fn reads_are_scoped_per_user_and_newest_first() {
        let store = HistoryStore::open_in_memory().expect("store");
        store.record(&success_row("alice", "libretranslate")).expect("insert");
        store.record(&success_row("alice", "cache")).expect("insert");
        store.record(&success_row("bob", "libretranslate")).expect("insert");

        let rows = store.recent_for_user("alice", 10).expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].provider, "cache");
        assert_eq!(rows[1].provider, "libretranslate");

        let limited = store.recent_for_user("alice", 1).expect("query");
        assert_eq!(limited.len(), 1);
    }
}
