use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable string-keyed value store.
///
/// Each namespace maps to its own SQLite file so that unrelated records
/// never contend on the same database. Values are opaque strings; callers
/// decide the encoding (the stores in this crate use JSON).
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    /// Open (or create) the store file for `namespace` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// file cannot be opened.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        let db_path = dir.join(format!("{namespace}.db"));
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
        Self::init_schema(&conn)?;

        log::info!("Key-value store '{namespace}' ready at {}", db_path.display());
        Ok(Self { conn })
    }

    /// Open a volatile store that lives only as long as the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to initialize store schema")?;
        Ok(())
    }

    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))?;
        Ok(value)
    }

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key '{key}'"))?;
        Ok(())
    }
}
