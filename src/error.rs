//! Unified error types for txdata.
//!
//! This module provides a clean error type that wraps the workspace's
//! internal errors and presents a consistent interface to users.

use thiserror::Error;

/// All txdata errors.
///
/// This is the canonical error type for every [`TxDataStore`](crate::TxDataStore)
/// operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction not present in the version store
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input (malformed range, illegal transition, duplicate insert)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Encoded data could not be read back (version, size or payload)
    #[error("corruption: {0}")]
    Corruption(String),

    /// Slab exhausted or output buffer too small; may succeed later
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Undo history exceeded its size limit; the write itself was kept
    #[error("size overflow: {size} bytes exceeds limit {limit}")]
    SizeOverflow {
        /// Estimated footprint in bytes
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while dumping diagnostics
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for txdata operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Exhausted resources may be available again once records are removed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ResourceExhausted(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the write was kept despite the error.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::SizeOverflow { .. })
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from internal core errors
impl From<txdata_core::Error> for Error {
    fn from(e: txdata_core::Error) -> Self {
        use txdata_core::Error as CoreError;
        match e {
            CoreError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            e @ CoreError::VersionMismatch { .. } => Error::Corruption(e.to_string()),
            e @ CoreError::InvalidSize { .. } => Error::Corruption(e.to_string()),
            CoreError::Deserialize(msg) => Error::Corruption(msg),
            e @ CoreError::BufNotEnough { .. } => Error::ResourceExhausted(e.to_string()),
            e @ CoreError::AllocFailed { .. } => Error::ResourceExhausted(e.to_string()),
            CoreError::SizeOverflow { size, limit, .. } => Error::SizeOverflow { size, limit },
            CoreError::Unexpected(msg) => Error::Internal(msg),
            CoreError::Config(msg) => Error::Config(msg),
        }
    }
}
