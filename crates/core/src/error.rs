//! Error types for transaction version records
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! mirror the failure classes a storage engine has to tell apart:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | InvalidArgument | Bad input: empty buffers, malformed ranges, illegal transitions |
//! | VersionMismatch | Envelope version differs from the compiled one |
//! | InvalidSize | Length field negative or larger than the remaining buffer |
//! | Deserialize | Payload is truncated or malformed |
//! | BufNotEnough | Output buffer too small for the encoding |
//! | AllocFailed | The slab allocator is exhausted |
//! | SizeOverflow | Soft size cap exceeded; the write itself was kept |
//! | Unexpected | Internal invariant violation |
//! | Config | Invalid configuration |

use thiserror::Error;

/// Result type for txdata operations
pub type Result<T> = std::result::Result<T, Error>;

/// All errors raised by the txdata crates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid input (empty buffer, malformed range, illegal state transition)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Envelope version does not match the expected version
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build understands
        expected: i64,
        /// Version found in the buffer
        actual: i64,
    },

    /// Length prefix is negative or exceeds the remaining input
    #[error("invalid size: declared {declared} bytes, {remaining} remaining")]
    InvalidSize {
        /// Length read from the buffer
        declared: i64,
        /// Bytes actually left in the buffer
        remaining: usize,
    },

    /// Payload could not be decoded
    #[error("deserialize error: {0}")]
    Deserialize(String),

    /// Output buffer is too small
    #[error("buffer not enough: need {needed} bytes, {remaining} remaining")]
    BufNotEnough {
        /// Bytes required by the next write
        needed: usize,
        /// Bytes left in the output buffer
        remaining: usize,
    },

    /// Slab allocator has no free slot
    #[error("allocation failed: {in_use} slots in use, capacity {capacity}")]
    AllocFailed {
        /// Slots currently handed out
        in_use: usize,
        /// Configured capacity of the slab
        capacity: usize,
    },

    /// Undo history is larger than the serialize limit
    ///
    /// The action that triggered this error has been stored. Callers should
    /// schedule cleanup instead of retrying the insert.
    #[error("size overflow: {node_count} undo nodes use {size} bytes, limit {limit}")]
    SizeOverflow {
        /// Nodes in the undo status list
        node_count: usize,
        /// Estimated footprint in bytes
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Internal invariant violation
    #[error("unexpected: {0}")]
    Unexpected(String),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::InvalidArgument`]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Build an [`Error::Deserialize`]
    pub fn deserialize(msg: impl Into<String>) -> Self {
        Error::Deserialize(msg.into())
    }

    /// Build an [`Error::Unexpected`]
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Error::Unexpected(msg.into())
    }

    /// Check if the operation may succeed when retried later.
    ///
    /// Only slab exhaustion is transient; everything else is either a caller
    /// bug or corrupt input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AllocFailed { .. })
    }

    /// Check if this error signals a broken internal invariant.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Unexpected(_))
    }

    /// Check if this error means the input bytes cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::VersionMismatch { .. } | Error::InvalidSize { .. } | Error::Deserialize(_)
        )
    }
}
