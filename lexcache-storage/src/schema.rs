//! Document layout of a persisted cache entry.
//!
//! | field        | kind    | contents                          |
//! |--------------|---------|-----------------------------------|
//! | `identifier` | keyword | cache identifier                  |
//! | `content`    | binary  | encoded payload                   |
//! | `tags`       | text    | tags joined by single spaces      |
//! | `lifetime`   | numeric | absolute expiry timestamp         |
//! | `schema`     | keyword | layout version                    |
//!
//! Version 1 documents indexed `lifetime` without storing it, so a hit
//! carries no readable expiry. Those are treated as expired.

use lexcache_core::{CacheEntry, UnixTimestamp};
use lexcache_index::{Document, Field};

pub const FIELD_IDENTIFIER: &str = "identifier";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_TAGS: &str = "tags";
pub const FIELD_LIFETIME: &str = "lifetime";
pub const FIELD_SCHEMA: &str = "schema";

pub const SCHEMA_VERSION: &str = "2";

/// Build the index document for a buffered entry.
pub fn entry_document(entry: &CacheEntry) -> Document {
    Document::new()
        .with_field(Field::keyword(FIELD_IDENTIFIER, entry.identifier.as_str()))
        .with_field(Field::binary(FIELD_CONTENT, entry.content.clone()))
        .with_field(Field::text(FIELD_TAGS, entry.tags.join(" ")))
        .with_field(Field::numeric(FIELD_LIFETIME, entry.expires_at))
        .with_field(Field::keyword(FIELD_SCHEMA, SCHEMA_VERSION))
}

/// Build a version 1 document: tags and lifetime indexed but not stored.
pub fn legacy_document(
    identifier: &str,
    content: &[u8],
    tags: &[&str],
    expires_at: UnixTimestamp,
) -> Document {
    Document::new()
        .with_field(Field::keyword(FIELD_IDENTIFIER, identifier))
        .with_field(Field::binary(FIELD_CONTENT, content.to_vec()))
        .with_field(Field::unstored(FIELD_TAGS, tags.join(" ")))
        .with_field(Field::unstored(FIELD_LIFETIME, expires_at.to_string()))
}

pub fn identifier(document: &Document) -> Option<&str> {
    document.text(FIELD_IDENTIFIER)
}

pub fn content(document: &Document) -> Option<&[u8]> {
    document.bytes(FIELD_CONTENT)
}

/// Stored expiry, `None` for documents that never stored one.
pub fn expires_at(document: &Document) -> Option<UnixTimestamp> {
    document.integer(FIELD_LIFETIME)
}
