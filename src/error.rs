//! Error types for the file host.

use thiserror::Error;

use crate::file::FileId;

/// Common error type for the file host.
#[derive(Error, Debug)]
pub enum FilehostError {
    /// The supplied identifier is not a syntactically valid file id.
    #[error("invalid file identifier: {0}")]
    InvalidIdentifier(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The file existed but its expiry time has passed.
    ///
    /// The record and its blob have been removed by the time this is returned.
    #[error("file {0} has expired")]
    Expired(FileId),

    /// The file is password protected and no password was supplied.
    #[error("password required")]
    PasswordRequired,

    /// The supplied password does not match.
    #[error("incorrect password")]
    IncorrectPassword,

    /// Blob store failure (write, read or delete).
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// Registry (metadata database) failure.
    ///
    /// Errors from sqlx are converted into this variant automatically.
    #[error("registry error: {0}")]
    Registry(String),

    /// Password hashing or hash parsing failure.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FilehostError {
    /// Whether this error is one the transport shows to clients as "not found".
    ///
    /// Covers `InvalidIdentifier`, `NotFound`, `Expired`, `PasswordRequired`
    /// and `IncorrectPassword`.
    pub fn is_not_found_like(&self) -> bool {
        matches!(
            self,
            FilehostError::InvalidIdentifier(_)
                | FilehostError::NotFound(_)
                | FilehostError::Expired(_)
                | FilehostError::PasswordRequired
                | FilehostError::IncorrectPassword
        )
    }
}

impl From<sqlx::Error> for FilehostError {
    fn from(e: sqlx::Error) -> Self {
        FilehostError::Registry(e.to_string())
    }
}

/// Result type alias for file host operations.
pub type Result<T> = std::result::Result<T, FilehostError>;
