//! Error types for the datacache library.

use thiserror::Error;

/// The result type used throughout datacache.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for cache operations.
///
/// A page cache lookup miss is *not* an error: `PageCache::lookup` signals
/// it by returning `None`. `NotFound` only appears on the engine-facing
/// path, when a block sub-key is absent or has expired.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred inside the cache engine.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid argument was provided. Caller bug, never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A lifecycle rule was violated (double init, use before init).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The requested entry was not found or has expired.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An internal engine failure, surfaced verbatim from the first
    /// failing sub-operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
