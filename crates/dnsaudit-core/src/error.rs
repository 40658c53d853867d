//! Error types for the DNS audit job
//!
//! This module defines all error types used throughout the crate.
//!
//! Where an error is caught decides how far it reaches:
//! - the engine propagates zone-listing and inventory errors (the run fails)
//! - zone tasks capture extraction and submission errors into the run report
//! - the publisher downgrades prior-evaluation lookup errors to a warning

use thiserror::Error;

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS audit job
#[derive(Error, Debug)]
pub enum Error {
    /// Zone listing or record listing errors
    #[error("Zone directory error: {0}")]
    ZoneDirectory(String),

    /// Region listing or address listing errors
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Evaluation lookup or submission errors
    #[error("Evaluation store error: {0}")]
    EvaluationStore(String),

    /// A paginated listing handed back a token it had already served
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Stored resource identifier could not be parsed
    #[error("Invalid resource id: {0}")]
    InvalidResourceId(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors (snapshot backend)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a zone directory error
    pub fn zone_directory(msg: impl Into<String>) -> Self {
        Self::ZoneDirectory(msg.into())
    }

    /// Create an inventory error
    pub fn inventory(msg: impl Into<String>) -> Self {
        Self::Inventory(msg.into())
    }

    /// Create an evaluation store error
    pub fn evaluation_store(msg: impl Into<String>) -> Self {
        Self::EvaluationStore(msg.into())
    }

    /// Create a pagination error
    pub fn pagination(msg: impl Into<String>) -> Self {
        Self::Pagination(msg.into())
    }

    /// Create an invalid resource id error
    pub fn invalid_resource_id(msg: impl Into<String>) -> Self {
        Self::InvalidResourceId(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
