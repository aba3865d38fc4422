//! Error types for lexcache operations

use std::path::PathBuf;
use thiserror::Error;

/// Master error type for all cache operations.
///
/// Configuration mistakes (bad compression level, bad index name) never show
/// up here: they are sanitized when options are built. Only conditions the
/// caller has to act on are surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Content handed to the engine was not a byte string.
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// The storage root for the index could not be created.
    #[error("Could not create cache directory {}: {reason}", path.display())]
    DirectoryCreationFailed { path: PathBuf, reason: String },

    /// The compression encoder or decoder failed.
    #[error("Compression failure: {reason}")]
    CompressionFailure { reason: String },

    /// Compression was requested but this build carries no encoder.
    #[error("Compression requested but no encoder is available in this build")]
    CompressionUnsupported,

    /// The document index could not be opened, queried or committed.
    #[error("Document index unavailable: {reason}")]
    IndexUnavailable { reason: String },
}

impl CacheError {
    /// Shorthand for an index failure.
    pub fn index(reason: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for a codec failure.
    pub fn compression(reason: impl Into<String>) -> Self {
        Self::CompressionFailure {
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same call could plausibly succeed.
    ///
    /// The engine itself never retries; this only helps callers decide.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IndexUnavailable { .. })
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
