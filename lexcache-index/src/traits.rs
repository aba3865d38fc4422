//! Document index trait and hit type.
//!
//! This trait abstracts over the concrete index store. The cache engine
//! depends only on this surface, which deliberately has no update
//! operation: replacing a document means deleting it and adding a new one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::IndexResult;
use crate::query::Query;

/// Default number of added documents an index keeps pending before it
/// flushes them on its own.
pub const DEFAULT_INDEX_MAX_BUFFERED_DOCS: usize = 10;

/// Internal document number, assigned on add and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One query result: the document number and its stored fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub id: DocId,
    pub document: Document,
}

/// An inverted document index.
///
/// # Visibility
///
/// - Added documents are invisible to [`find`](DocumentIndex::find) until
///   [`commit`](DocumentIndex::commit), or until the index flushes on its own
///   because more than [`max_buffered_docs`](DocumentIndex::max_buffered_docs)
///   additions are pending.
/// - Deleted documents disappear from `find` immediately; the deletion is
///   made durable by the next commit.
pub trait DocumentIndex: Send {
    /// Queue a document for addition and return its number.
    fn add_document(&mut self, document: Document) -> IndexResult<DocId>;

    /// Delete a document. Unknown ids are ignored.
    fn delete(&mut self, id: DocId) -> IndexResult<()>;

    /// Make every pending addition and deletion durable and visible.
    fn commit(&mut self) -> IndexResult<()>;

    /// Forget additions made since the last successful flush. Pending
    /// deletions are kept. Returns how many documents were dropped.
    fn discard_pending_additions(&mut self) -> usize;

    /// Committed, non-deleted documents matching the query, by ascending id.
    fn find(&self, query: &Query) -> IndexResult<Vec<Hit>>;

    /// Compact storage. A hint; never changes query results.
    fn optimize(&mut self) -> IndexResult<()>;

    /// Pending additions allowed before the index flushes on its own.
    fn max_buffered_docs(&self) -> usize;

    fn set_max_buffered_docs(&mut self, max: usize);

    /// Number of committed, non-deleted documents.
    fn count(&self) -> IndexResult<usize>;

    /// Whether additions or deletions are waiting for a commit.
    fn has_uncommitted_changes(&self) -> bool;
}
