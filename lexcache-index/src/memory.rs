//! In-memory document index.
//!
//! Same visibility rules as the LMDB store, nothing persisted. Used for
//! ephemeral caches and as the fast index in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::document::{Document, IndexTerm, StoredDocument};
use crate::error::IndexResult;
use crate::pending::PendingChanges;
use crate::query::{evaluate, in_range, Query, TermSource, WildcardMatcher};
use crate::tokenizer::{SingleSpaceTokenizer, Tokenizer};
use crate::traits::{DocId, DocumentIndex, Hit, DEFAULT_INDEX_MAX_BUFFERED_DOCS};

pub struct MemoryIndex {
    documents: BTreeMap<DocId, StoredDocument>,
    /// (field, term) -> documents
    postings: BTreeMap<(String, String), BTreeSet<DocId>>,
    /// field -> value -> documents
    numeric: BTreeMap<String, BTreeMap<i64, BTreeSet<DocId>>>,
    pending: PendingChanges,
    next_id: u64,
    max_buffered_docs: usize,
    flushes: u64,
    tokenizer: Box<dyn Tokenizer>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::with_tokenizer(Box::new(SingleSpaceTokenizer))
    }

    pub fn with_tokenizer(tokenizer: Box<dyn Tokenizer>) -> Self {
        Self {
            documents: BTreeMap::new(),
            postings: BTreeMap::new(),
            numeric: BTreeMap::new(),
            pending: PendingChanges::default(),
            next_id: 0,
            max_buffered_docs: DEFAULT_INDEX_MAX_BUFFERED_DOCS,
            flushes: 0,
            tokenizer,
        }
    }

    /// How many times pending changes were written, by explicit commits or
    /// by the index flushing on its own.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);

        for id in pending.deletes {
            if let Some(stored) = self.documents.remove(&id) {
                for term in &stored.terms {
                    self.unindex(term, id);
                }
            }
        }

        for (id, stored) in pending.adds {
            for term in &stored.terms {
                match term {
                    IndexTerm::Term { field, term } => {
                        self.postings
                            .entry((field.clone(), term.clone()))
                            .or_default()
                            .insert(id);
                    }
                    IndexTerm::Numeric { field, value } => {
                        self.numeric
                            .entry(field.clone())
                            .or_default()
                            .entry(*value)
                            .or_default()
                            .insert(id);
                    }
                }
            }
            self.documents.insert(id, stored);
        }

        self.flushes += 1;
    }

    fn unindex(&mut self, term: &IndexTerm, id: DocId) {
        match term {
            IndexTerm::Term { field, term } => {
                let key = (field.clone(), term.clone());
                if let Some(docs) = self.postings.get_mut(&key) {
                    docs.remove(&id);
                    if docs.is_empty() {
                        self.postings.remove(&key);
                    }
                }
            }
            IndexTerm::Numeric { field, value } => {
                if let Some(values) = self.numeric.get_mut(field) {
                    if let Some(docs) = values.get_mut(value) {
                        docs.remove(&id);
                        if docs.is_empty() {
                            values.remove(value);
                        }
                    }
                    if values.is_empty() {
                        self.numeric.remove(field);
                    }
                }
            }
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TermSource for MemoryIndex {
    fn term_docs(&self, field: &str, term: &str) -> IndexResult<BTreeSet<DocId>> {
        Ok(self
            .postings
            .get(&(field.to_string(), term.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn range_docs(
        &self,
        field: &str,
        lower: Bound<i64>,
        upper: Bound<i64>,
    ) -> IndexResult<BTreeSet<DocId>> {
        let Some(values) = self.numeric.get(field) else {
            return Ok(BTreeSet::new());
        };
        Ok(values
            .iter()
            .filter(|(value, _)| in_range(**value, lower, upper))
            .flat_map(|(_, docs)| docs.iter().copied())
            .collect())
    }

    fn wildcard_docs(
        &self,
        field: &str,
        pattern: &str,
        matcher: &WildcardMatcher,
    ) -> IndexResult<BTreeSet<DocId>> {
        let prefix = WildcardMatcher::literal_prefix(pattern);
        let start = (field.to_string(), prefix.to_string());
        Ok(self
            .postings
            .range(start..)
            .take_while(|((f, term), _)| f == field && term.starts_with(prefix))
            .filter(|((_, term), _)| matcher.matches(term))
            .flat_map(|(_, docs)| docs.iter().copied())
            .collect())
    }
}

impl DocumentIndex for MemoryIndex {
    fn add_document(&mut self, document: Document) -> IndexResult<DocId> {
        let id = DocId::new(self.next_id);
        self.next_id += 1;
        self.pending.add(id, document.analyze(self.tokenizer.as_ref()));
        if self.pending.pending_adds() >= self.max_buffered_docs {
            self.apply_pending();
        }
        Ok(id)
    }

    fn delete(&mut self, id: DocId) -> IndexResult<()> {
        let pending_add = self.pending.adds.iter().any(|(pending, _)| *pending == id);
        if pending_add || self.documents.contains_key(&id) {
            self.pending.delete(id);
        }
        Ok(())
    }

    fn commit(&mut self) -> IndexResult<()> {
        if !self.pending.is_empty() {
            self.apply_pending();
        }
        Ok(())
    }

    fn discard_pending_additions(&mut self) -> usize {
        self.pending.discard_adds()
    }

    fn find(&self, query: &Query) -> IndexResult<Vec<Hit>> {
        let ids = evaluate(query, self)?;
        Ok(ids
            .into_iter()
            .filter(|id| !self.pending.is_deleted(*id))
            .filter_map(|id| {
                self.documents.get(&id).map(|stored| Hit {
                    id,
                    document: stored.document.clone(),
                })
            })
            .collect())
    }

    fn optimize(&mut self) -> IndexResult<()> {
        self.commit()
    }

    fn max_buffered_docs(&self) -> usize {
        self.max_buffered_docs
    }

    fn set_max_buffered_docs(&mut self, max: usize) {
        self.max_buffered_docs = max.max(1);
    }

    fn count(&self) -> IndexResult<usize> {
        Ok(self.documents.len() - self.pending.deletes.len())
    }

    fn has_uncommitted_changes(&self) -> bool {
        !self.pending.is_empty()
    }
}
