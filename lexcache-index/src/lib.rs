//! lexcache Index - Inverted Document Store
//!
//! The document index the cache engine persists into. Documents are flat
//! field lists; queries are exact terms, numeric ranges, wildcard patterns
//! and boolean combinations of those.
//!
//! Two stores implement [`DocumentIndex`]:
//! - [`LmdbIndex`]: persistent, one LMDB environment per index directory
//! - [`MemoryIndex`]: same visibility rules, nothing persisted

pub mod document;
pub mod error;
pub mod lmdb;
pub mod memory;
pub mod query;
pub mod tokenizer;
pub mod traits;

mod pending;

pub use document::{Document, Field, FieldKind, FieldValue};
pub use error::{IndexError, IndexResult};
pub use lmdb::LmdbIndex;
pub use memory::MemoryIndex;
pub use query::{Query, WildcardMatcher};
pub use tokenizer::{SingleSpaceTokenizer, Tokenizer};
pub use traits::{DocId, DocumentIndex, Hit, DEFAULT_INDEX_MAX_BUFFERED_DOCS};
