use pioforum_shared::ValidationError;
use pioforum_store::StoreError;
use thiserror::Error;

/// Failure of a single user action. Nothing here is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForumError {
    #[error("{field} cannot be empty.")]
    EmptyInput { field: &'static str },

    #[error("{field} is too long ({len} characters, max {max}).")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Channel name already exists.")]
    DuplicateName(String),

    #[error("{0} not found.")]
    NotFound(String),

    #[error("You must be logged in to do that.")]
    Unauthenticated,

    #[error("Only the forum administrator can manage channels.")]
    Unauthorized,

    #[error("No active channel selected.")]
    NoActiveChannel,

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("The forum has shut down.")]
    Closed,
}

impl ForumError {
    /// Whether the error was raised locally, before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ForumError::EmptyInput { .. } | ForumError::TooLong { .. } | ForumError::DuplicateName(_)
        )
    }
}

impl From<ValidationError> for ForumError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Empty(field) => ForumError::EmptyInput { field },
            ValidationError::TooLong { field, len, max } => ForumError::TooLong { field, len, max },
        }
    }
}

impl From<StoreError> for ForumError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ForumError::NotFound("Record".into()),
            StoreError::Conflict(name) => ForumError::DuplicateName(name),
            other => ForumError::RemoteUnavailable(other.to_string()),
        }
    }
}

impl From<AuthError> for ForumError {
    fn from(err: AuthError) -> Self {
        ForumError::RemoteUnavailable(err.to_string())
    }
}

/// Errors reported by an auth provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Identity has no id")]
    MissingId,

    #[error("Auth provider unavailable: {0}")]
    Unavailable(String),
}

pub type ForumResult<T> = std::result::Result<T, ForumError>;
