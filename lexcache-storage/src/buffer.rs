//! Write buffer shadowing the document index.
//!
//! Entries are kept in insertion order. Writing an identifier that is already
//! buffered replaces its entry in place, so the commit order of a batch is
//! the order in which identifiers were first written.

use std::collections::{BTreeMap, HashMap};

use lexcache_core::CacheEntry;

#[derive(Debug, Default)]
pub struct WriteBuffer {
    /// identifier -> insertion sequence
    positions: HashMap<String, u64>,
    /// insertion sequence -> entry
    entries: BTreeMap<u64, CacheEntry>,
    next_seq: u64,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entry. Returns the entry it replaced, if any.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        if let Some(seq) = self.positions.get(&entry.identifier) {
            return self.entries.insert(*seq, entry);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(entry.identifier.clone(), seq);
        self.entries.insert(seq, entry);
        None
    }

    pub fn get(&self, identifier: &str) -> Option<&CacheEntry> {
        self.positions
            .get(identifier)
            .and_then(|seq| self.entries.get(seq))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.positions.contains_key(identifier)
    }

    pub fn remove(&mut self, identifier: &str) -> Option<CacheEntry> {
        let seq = self.positions.remove(identifier)?;
        self.entries.remove(&seq)
    }

    /// Buffered identifiers in insertion order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|entry| entry.identifier.as_str())
    }

    /// Buffered entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identifier: &str, content: &str) -> CacheEntry {
        CacheEntry::new(identifier, content.as_bytes().to_vec(), vec![], 100)
    }

    #[test]
    fn test_last_write_wins_in_place() {
        let mut buffer = WriteBuffer::new();
        buffer.insert(entry("a", "1"));
        buffer.insert(entry("b", "2"));
        let replaced = buffer.insert(entry("a", "3"));

        assert_eq!(replaced.map(|e| e.content), Some(b"1".to_vec()));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.identifiers().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(buffer.get("a").map(|e| e.content.as_slice()), Some(&b"3"[..]));
    }

    #[test]
    fn test_remove_and_reinsert_moves_to_end() {
        let mut buffer = WriteBuffer::new();
        buffer.insert(entry("a", "1"));
        buffer.insert(entry("b", "2"));

        assert!(buffer.remove("a").is_some());
        assert!(buffer.remove("a").is_none());
        assert!(!buffer.contains("a"));

        buffer.insert(entry("a", "4"));
        assert_eq!(buffer.identifiers().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = WriteBuffer::new();
        buffer.insert(entry("a", "1"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.get("a").is_none());
    }
}
