//! Error types for kblink.

use thiserror::Error;

/// Result type for kblink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kblink operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A knowledge base record could not be parsed.
    #[error("KB load error: {0}")]
    KbLoad(String),

    /// A submission-format or ground-truth row could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An entity type label outside PER/ORG/GPE/LOC.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cache serialization/deserialization failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a KB load error.
    pub fn kb_load(msg: impl Into<String>) -> Self {
        Error::KbLoad(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Error::Cache(msg.into())
    }
}
