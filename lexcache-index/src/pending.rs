//! Uncommitted additions and deletions, shared by both index stores.

use std::collections::BTreeSet;

use crate::document::StoredDocument;
use crate::traits::DocId;

#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    /// Additions in the order they were made.
    pub adds: Vec<(DocId, StoredDocument)>,
    /// Committed documents to delete on the next commit.
    pub deletes: BTreeSet<DocId>,
}

impl PendingChanges {
    pub fn add(&mut self, id: DocId, document: StoredDocument) {
        self.adds.push((id, document));
    }

    /// Record a deletion. A document that was never committed is simply
    /// dropped from the pending additions.
    pub fn delete(&mut self, id: DocId) {
        if let Some(pos) = self.adds.iter().position(|(pending, _)| *pending == id) {
            self.adds.remove(pos);
        } else {
            self.deletes.insert(id);
        }
    }

    /// Drop every pending addition, keeping recorded deletions.
    pub fn discard_adds(&mut self) -> usize {
        let discarded = self.adds.len();
        self.adds.clear();
        discarded
    }

    pub fn is_deleted(&self, id: DocId) -> bool {
        self.deletes.contains(&id)
    }

    pub fn pending_adds(&self) -> usize {
        self.adds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn stored() -> StoredDocument {
        StoredDocument {
            document: Document::new(),
            terms: Vec::new(),
        }
    }

    #[test]
    fn test_deleting_pending_add_cancels_it() {
        let mut pending = PendingChanges::default();
        pending.add(DocId::new(7), stored());
        pending.delete(DocId::new(7));

        assert!(pending.is_empty());
        assert!(!pending.is_deleted(DocId::new(7)));
    }

    #[test]
    fn test_discard_adds_keeps_deletions() {
        let mut pending = PendingChanges::default();
        pending.add(DocId::new(1), stored());
        pending.add(DocId::new(2), stored());
        pending.delete(DocId::new(9));

        assert_eq!(pending.discard_adds(), 2);
        assert_eq!(pending.pending_adds(), 0);
        assert!(pending.is_deleted(DocId::new(9)));
    }

    #[test]
    fn test_deleting_committed_doc_is_recorded() {
        let mut pending = PendingChanges::default();
        pending.delete(DocId::new(3));
        assert!(pending.is_deleted(DocId::new(3)));
        assert_eq!(pending.pending_adds(), 0);
        assert!(!pending.is_empty());
    }
}
