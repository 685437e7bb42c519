//! SQLite connection handle for the forum collections.
//!
//! Opening a [`Database`] always brings the schema up to date first.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use directories::ProjectDirs;
use rusqlite::types::Type;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Owned SQLite connection with the forum schema applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default forum database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/pioforum/pioforum.db`
    /// - macOS:   `~/Library/Application Support/org.pioexplore.pioforum/pioforum.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\pioexplore\pioforum\data\pioforum.db`
    pub fn new() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    /// Path used by [`Database::new`]. Creates the parent directory.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("org", "pioexplore", "pioforum").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("pioforum.db"))
    }

    /// Open or create the database file at `path` in WAL mode.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private in-memory database. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access, needed for transactions.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Backing file, `None` for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

/// Current time at the precision the store keeps, so a record built from it
/// compares equal to the same record read back.
pub fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps are stored as unix microseconds.
pub(crate) fn to_micros(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

pub(crate) fn from_micros(value: i64, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            Type::Integer,
            format!("timestamp out of range: {value}").into(),
        )
    })
}

pub(crate) fn parse_uuid(value: &str, col: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
    }

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Database::open_at(&path).unwrap());
        let db = Database::open_at(&path).unwrap();
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }

    #[test]
    fn micros_round_trip() {
        let now = Utc::now();
        let back = from_micros(to_micros(now), 0).unwrap();
        assert_eq!(back.timestamp_micros(), now.timestamp_micros());
        assert!(from_micros(i64::MAX, 0).is_err());
    }

    #[test]
    fn in_memory_has_no_path() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }
}
