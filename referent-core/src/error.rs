//! Error types for referent-core.

use thiserror::Error;

/// Result type for referent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for referent operations.
///
/// Only failures the engine cannot recover from end up here. Degenerate
/// inputs (zero compatibility mass, disjoint inlinks, missing document
/// frequencies) are handled with fallback constants and never surface as
/// errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A lookup service failed to answer.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a lookup error.
    #[must_use]
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
