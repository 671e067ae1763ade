use crate::model::{RowResult, StorageError, StoredMatch};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

/// История сопоставлений: по одной записи на каждую обработанную строку.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Открывает базу и создаёт таблицу при необходимости.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn migrate(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                best_id TEXT,
                best_title TEXT,
                best_price REAL,
                score REAL,
                url TEXT,
                status TEXT NOT NULL,
                matched_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_query ON matches(query);
            ",
        )?;
        Ok(())
    }

    pub fn save_result(&self, result: &RowResult) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO matches (query, best_id, best_title, best_price, score, url, status, matched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &result.query,
                &result.best_id,
                &result.best_title,
                &result.best_price,
                &result.score,
                &result.url,
                &result.status_label(),
                &Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Последнее сохранённое сопоставление для запроса.
    pub fn last_match(&self, query: &str) -> Result<Option<StoredMatch>, StorageError> {
        let stored = self
            .conn
            .query_row(
                "SELECT query, best_id, score, status, matched_at FROM matches
                 WHERE query = ?1 ORDER BY id DESC LIMIT 1",
                params![query],
                |row| {
                    let matched_at: String = row.get(4)?;
                    Ok(StoredMatch {
                        query: row.get(0)?,
                        best_id: row.get(1)?,
                        score: row.get(2)?,
                        status: row.get(3)?,
                        matched_at: DateTime::parse_from_rfc3339(&matched_at)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        Ok(stored)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
