//! Failures of the document index stores.

use std::path::PathBuf;

use lexcache_core::CacheError;

use crate::traits::DocId;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index directory could not be opened as a store.
    #[error("Cannot open index at {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    /// One of the documents, postings, numeric or meta tables is unusable.
    #[error("Index table {table:?} unavailable: {reason}")]
    Table { table: &'static str, reason: String },

    /// Reading postings, numeric keys or stored documents failed.
    #[error("Index read failed: {0}")]
    Read(String),

    /// Writing or removing postings, numeric keys or the id counter failed.
    #[error("Index write failed: {0}")]
    Write(String),

    /// A stored document could not be encoded or decoded.
    #[error("Stored document {id} is unreadable: {reason}")]
    Document { id: DocId, reason: String },

    #[error("Invalid wildcard pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Every index failure reaches cache callers as an unavailable index.
impl From<IndexError> for CacheError {
    fn from(e: IndexError) -> Self {
        CacheError::IndexUnavailable {
            reason: e.to_string(),
        }
    }
}
