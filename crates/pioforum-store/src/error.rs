use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("Conflicting record: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The store cannot serve requests (poisoned lock, closed backend, ...).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),
}

impl StoreError {
    /// Map a constraint violation to [`StoreError::Conflict`], anything else
    /// to [`StoreError::Sqlite`].
    pub(crate) fn from_write(err: rusqlite::Error, what: &str) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(what.to_string())
            }
            other => StoreError::Sqlite(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
