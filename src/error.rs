//! Centralized error types for mailquery.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailquery library.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The request is structurally invalid (filter shape, sort, position, properties).
    #[error("{0}")]
    InvalidArguments(String),

    /// The text-search oracle could not answer.
    #[error("Search index unavailable: {0}")]
    SearchUnavailable(String),

    /// The visible mailbox set could not be resolved.
    #[error("Visible mailboxes unavailable: {0}")]
    VisibilityUnavailable(String),

    /// The message store could not list messages.
    #[error("Message store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller cancelled the query through its progress callback.
    #[error("Query cancelled by caller")]
    Cancelled,

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A snapshot file is malformed.
    #[error("Invalid snapshot '{path}': {reason}")]
    Snapshot { path: PathBuf, reason: String },

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),
}

/// Convenience alias for `Result<T, QueryError>`.
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`QueryError::InvalidArguments`].
    pub fn invalid(description: impl Into<String>) -> Self {
        Self::InvalidArguments(description.into())
    }

    /// Protocol-level error kind reported to the client.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalidArguments",
            Self::Cancelled => "cancelled",
            _ => "serverFail",
        }
    }

    /// Whether the error comes from an unavailable collaborator rather than the request.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::SearchUnavailable(_) | Self::VisibilityUnavailable(_) | Self::StoreUnavailable(_)
        )
    }
}

impl From<std::io::Error> for QueryError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
