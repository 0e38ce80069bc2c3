use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to acquire database lock")]
    Lock,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at the default location in the user's data directory
    pub fn new() -> Result<Self, DbError> {
        Self::open(&default_database_path())
    }

    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::info!(path = %path.display(), "opened document database");

        Self::with_connection(conn)
    }

    /// In-memory database, used by tests and throwaway sessions
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_docs_table()?;
        Ok(db)
    }
}

pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inkpad")
        .join("inkpad.db")
}
