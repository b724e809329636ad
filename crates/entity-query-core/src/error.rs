//! Error taxonomy for the query engine.
//!
//! Every engine operation returns [`QueryError`]. The three variants let a
//! caller tell apart "the request was malformed", "the thing you asked for
//! does not exist", and "a backing store failed". An empty result is never
//! an error.

use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    /// The requested entity is absent from the entity store.
    #[error("{0}")]
    NotFound(String),

    /// A filter or pagination argument was rejected before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A collaborator store failed. The engine never retries.
    #[error("storage failure: {0:#}")]
    Internal(anyhow::Error),
}

/// Machine-readable error kind, for mapping onto exit or status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Internal => "internal",
        }
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::NotFound(_) => ErrorKind::NotFound,
            QueryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            QueryError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn entity_not_found(id: &str) -> Self {
        QueryError::NotFound(format!("entity '{}' not found", id))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        QueryError::InvalidArgument(msg.into())
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Internal(err)
    }
}
