//! Local (single-process) `IndexStore` variant backed by `rusqlite`.
//!
//! Serializes access on a single in-process connection guarded by a
//! `Mutex`, and retries transparently on a "database locked" transient
//! error (spec.md §4.4 "Concurrency discipline").

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::store::{IndexRow, IndexStore};

pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS idx (
                path TEXT PRIMARY KEY,
                min_time REAL NOT NULL,
                max_time REAL NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against the connection, retrying transparently while
    /// sqlite reports the database as locked by a concurrent writer.
    fn with_retry<T>(&self, mut f: impl FnMut(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        loop {
            let conn = self.conn.lock().unwrap();
            match f(&conn) {
                Ok(value) => return Ok(value),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy =>
                {
                    drop(conn);
                    std::thread::sleep(Duration::from_millis(20));
                    continue;
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
    }
}

impl IndexStore for SqliteStore {
    fn add(&self, path: &Path, min_time: f64, max_time: f64) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO idx (path, min_time, max_time) VALUES (?1, ?2, ?3)",
                params![path_str, min_time, max_time],
            )
        })?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        self.with_retry(|conn| conn.execute("DELETE FROM idx WHERE path = ?1", params![path_str]))?;
        Ok(())
    }

    fn indexed(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy().into_owned();
        let exists = self.with_retry(|conn| {
            conn.query_row(
                "SELECT 1 FROM idx WHERE path = ?1",
                params![path_str],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })?;
        Ok(exists)
    }

    fn query(&self, begin: Option<f64>, end: Option<f64>) -> Result<Vec<IndexRow>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT path, min_time, max_time FROM idx
                 WHERE (?1 IS NULL OR ?1 <= max_time)
                   AND (?2 IS NULL OR min_time <= ?2)",
            )?;
            let rows = stmt
                .query_map(params![begin, end], |row| {
                    Ok(IndexRow {
                        path: PathBuf::from(row.get::<_, String>(0)?),
                        min_time: row.get(1)?,
                        max_time: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn clean(&self) -> Result<()> {
        let paths = self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT path FROM idx")?;
            stmt.query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;

        for path in paths {
            if !Path::new(&path).exists() {
                self.with_retry(|conn| {
                    conn.execute("DELETE FROM idx WHERE path = ?1", params![path])
                })?;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn modified_at(&self) -> Result<SystemTime> {
        Ok(std::fs::metadata(&self.path)?.modified()?)
    }
}
