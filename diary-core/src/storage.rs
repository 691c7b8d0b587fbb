//! SQLite database shared by the weather cache and the diary store.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::{path::Path, sync::Arc, time::Duration};

/// How long a writer waits for another connection (or process) to release the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One SQLite connection, used from blocking tasks.
///
/// Several handles (the daemon, a `write` invocation) may open the same file;
/// SQLite serializes their writes, so rows appended by each are all kept.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "Opened database");

        Self::with_schema(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Arc<Self>> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Arc<Self>> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                condition TEXT NOT NULL,
                icon_code TEXT NOT NULL,
                temperature_kelvin REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS diary (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                text TEXT NOT NULL,
                condition TEXT NOT NULL,
                icon_code TEXT NOT NULL,
                temperature_kelvin REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_date ON weather(date);
            CREATE INDEX IF NOT EXISTS idx_diary_date ON diary(date);
            "#,
        )
        .context("Failed to initialize database schema")?;

        Ok(Arc::new(Self { conn: Mutex::new(conn) }))
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<R, F>(self: &Arc<Self>, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = db.conn.lock();
            f(&mut conn)
        })
        .await
        .context("Database task panicked")?;

        Ok(result?)
    }
}
