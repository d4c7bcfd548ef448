use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};

mod migrations;

use migrations::run_migrations;

/// SQLite-backed key-value table holding every persisted record as a JSON string.
///
/// The app assumes a single writer, so one connection behind a mutex is shared by
/// every clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
        let database = Self::init(conn, db_path)?;

        info!("Database initialized at {}", database.path().display());
        Ok(database)
    }

    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory SQLite database")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(mut conn: Connection, db_path: PathBuf) -> Result<Self> {
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        run_migrations(&mut conn).context("failed to run database migrations")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))?;
        task(&mut guard)
    }

    pub fn schema_version(&self) -> Result<i32> {
        self.execute(|conn| migrations::schema_version(conn))
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.execute(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.execute(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete key {key}"))?;
            Ok(())
        })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key ASC")?;
            let mut rows = stmt.query([])?;
            let mut keys = Vec::new();
            while let Some(row) = rows.next()? {
                keys.push(row.get(0)?);
            }
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_database_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("focusflow.sqlite3");
        let db = Database::new(path.clone()).unwrap();

        assert!(path.exists());
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn put_overwrites_and_delete_removes() {
        let db = Database::in_memory().unwrap();

        assert_eq!(db.get_value("focusflow_tasks").unwrap(), None);
        db.put_value("focusflow_tasks", "[]").unwrap();
        db.put_value("focusflow_tasks", "[1]").unwrap();
        assert_eq!(db.get_value("focusflow_tasks").unwrap().as_deref(), Some("[1]"));
        assert_eq!(db.keys().unwrap(), vec!["focusflow_tasks".to_string()]);

        db.delete_value("focusflow_tasks").unwrap();
        assert_eq!(db.get_value("focusflow_tasks").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("focusflow.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.put_value("focusflow_stats", r#"{"totalSessions":3}"#).unwrap();
        }

        let reopened = Database::new(path).unwrap();
        assert_eq!(
            reopened.get_value("focusflow_stats").unwrap().as_deref(),
            Some(r#"{"totalSessions":3}"#)
        );
        assert_eq!(reopened.schema_version().unwrap(), 1);
    }
}
