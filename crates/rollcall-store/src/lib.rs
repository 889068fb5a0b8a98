//! rollcall-store — append-only SQLite attendance log.
//!
//! Records are `{name, date, time}` triples stamped at the moment an
//! identity is marked present. The store only ever appends during a
//! session; listing and CSV export serve the reporting surface.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One attendance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub name: String,
    /// `%Y-%m-%d`
    pub date: String,
    /// `%H:%M:%S`
    pub time: String,
}

impl AttendanceRecord {
    /// A record for `name` stamped with the current local date and time.
    pub fn now(name: &str) -> Self {
        let now = chrono::Local::now();
        Self {
            name: name.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
        }
    }
}

/// Handle to the attendance database. Cheap to clone; all calls run on
/// the connection's dedicated background thread.
#[derive(Clone)]
pub struct AttendanceStore {
    conn: Connection,
}

impl AttendanceStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// In-memory database (tests, dry runs).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS attendance (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    date TEXT NOT NULL,
                    time TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Append one record.
    pub async fn append(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO attendance (name, date, time) VALUES (?1, ?2, ?3)",
                    rusqlite::params![record.name, record.date, record.time],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// All records in insertion order.
    pub async fn records(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name, date, time FROM attendance ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(AttendanceRecord {
                            name: row.get(0)?,
                            date: row.get(1)?,
                            time: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Write all records to `path` as CSV. Returns the row count.
    pub async fn export_csv(&self, path: &Path) -> Result<usize, StoreError> {
        let records = self.records().await?;

        let mut out = String::from("Name,Date,Time\n");
        for r in &records {
            out.push_str(&csv_field(&r.name));
            out.push(',');
            out.push_str(&csv_field(&r.date));
            out.push(',');
            out.push_str(&csv_field(&r.time));
            out.push('\n');
        }

        tokio::fs::write(path, out).await?;
        tracing::info!(rows = records.len(), path = %path.display(), "exported attendance CSV");
        Ok(records.len())
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_list_round_trips() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let record = AttendanceRecord {
            name: "alice".into(),
            date: "2026-08-07".into(),
            time: "09:15:00".into(),
        };
        store.append(&record).await.unwrap();

        let records = store.records().await.unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn records_keep_insertion_order() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        for name in ["carol", "alice", "bob"] {
            store.append(&AttendanceRecord::now(name)).await.unwrap();
        }

        let names: Vec<String> = store
            .records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/attendance.db");
        let store = AttendanceStore::open(&path).await.unwrap();
        store.append(&AttendanceRecord::now("alice")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn export_csv_writes_header_and_rows() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        store
            .append(&AttendanceRecord {
                name: "alice".into(),
                date: "2026-08-07".into(),
                time: "09:15:00".into(),
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = store.export_csv(&path).await.unwrap();

        assert_eq!(rows, 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Name,Date,Time\nalice,2026-08-07,09:15:00\n");
    }

    #[tokio::test]
    async fn export_csv_empty_store_is_header_only() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        let rows = store.export_csv(&path).await.unwrap();
        assert_eq!(rows, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Date,Time\n");
    }

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("alice"), "alice");
        assert_eq!(csv_field("smith, jane"), "\"smith, jane\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn record_now_uses_expected_formats() {
        let record = AttendanceRecord::now("alice");
        assert_eq!(record.name, "alice");
        assert_eq!(record.date.len(), 10);
        assert!(record.date.chars().nth(4) == Some('-'));
        assert_eq!(record.time.len(), 8);
        assert!(record.time.chars().nth(2) == Some(':'));
    }
}
