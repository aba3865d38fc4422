//! Cache entry representation.

use serde::{Deserialize, Serialize};

use crate::clock::UnixTimestamp;

/// Expiry timestamp used for entries with unlimited lifetime
/// (9999-12-31T23:59:59Z).
pub const UNLIMITED_EXPIRES_AT: UnixTimestamp = 253_402_300_799;

/// One cache entry as staged in the write buffer.
///
/// `content` is whatever the codec produced (compressed or not); the engine
/// never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub identifier: String,
    pub content: Vec<u8>,
    pub tags: Vec<String>,
    pub expires_at: UnixTimestamp,
}

impl CacheEntry {
    pub fn new(
        identifier: impl Into<String>,
        content: Vec<u8>,
        tags: Vec<String>,
        expires_at: UnixTimestamp,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            content,
            tags,
            expires_at,
        }
    }

    /// An entry is live up to and including its expiry second.
    pub fn is_live(&self, now: UnixTimestamp) -> bool {
        self.expires_at >= now
    }

    /// Whether the entry never expires.
    pub fn is_unlimited(&self) -> bool {
        self.expires_at >= UNLIMITED_EXPIRES_AT
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_boundary_is_inclusive() {
        let entry = CacheEntry::new("page_1", b"x".to_vec(), vec![], 100);
        assert!(entry.is_live(99));
        assert!(entry.is_live(100));
        assert!(!entry.is_live(101));
    }

    #[test]
    fn test_unlimited_entry() {
        let entry = CacheEntry::new("page_1", vec![], vec![], UNLIMITED_EXPIRES_AT);
        assert!(entry.is_unlimited());
        assert!(entry.is_live(UNLIMITED_EXPIRES_AT));
    }

    #[test]
    fn test_has_tag() {
        let entry = CacheEntry::new(
            "page_1",
            vec![],
            vec!["pageId_1".to_string(), "news".to_string()],
            10,
        );
        assert!(entry.has_tag("news"));
        assert!(!entry.has_tag("new"));
    }
}
