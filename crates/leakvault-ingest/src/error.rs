//! Error types for the ingest job
//!
//! Variants split into two families. File-level errors (`Configuration`,
//! `Fetch`, `Hash`, `Worker`) stop the whole run and are returned to the
//! caller. Batch-level errors (`Marshal`, `Persist`) are logged by the worker
//! that hit them and never leave the pipeline. `Lookup` and `NotFound` belong
//! to the read path.

use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Required setting missing or invalid; raised before any line is read
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input bytes could not be obtained or read
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A record could not be converted to the sink's wire representation
    #[error("Marshal error: {0}")]
    Marshal(String),

    /// The sink rejected a write
    #[error("Persist error: {0}")]
    Persist(String),

    /// The hashing primitive failed; plaintext must not be stored instead
    #[error("Hash error: {0}")]
    Hash(String),

    /// A worker task panicked or was torn down
    #[error("Worker error: {0}")]
    Worker(String),

    /// The store could not answer a lookup
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A lookup matched nothing
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IngestError {
    /// Whether this error ends the run rather than a single batch
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IngestError::Marshal(_) | IngestError::Persist(_))
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Worker(err.to_string())
    }
}
