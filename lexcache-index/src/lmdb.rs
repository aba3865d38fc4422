//! LMDB-backed document index.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist documents and
//! their inverted postings in one environment per index directory.
//!
//! # Layout
//!
//! Four named databases:
//! - `documents`: doc id (u64 BE) -> stored fields + indexed terms (bincode)
//! - `postings`: `field 0x00 term 0x00 id` -> ()
//! - `numeric`: `field 0x00 sortable(value) id` -> ()
//! - `meta`: `next_id` -> u64
//!
//! Keys sort so that every posting of one term, and every numeric value of
//! one field, forms a contiguous prefix range.
//!
//! # Commits
//!
//! Additions and deletions are held in memory and written in a single write
//! transaction on commit, so a commit is all-or-nothing. LMDB's own lock file
//! serializes writers across processes.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use heed::byteorder::BigEndian;
use heed::types::{Bytes, SerdeBincode, Str, Unit, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn};

use crate::document::{Document, IndexTerm, StoredDocument};
use crate::error::{IndexError, IndexResult};
use crate::pending::PendingChanges;
use crate::query::{evaluate, in_range, Query, TermSource, WildcardMatcher};
use crate::tokenizer::{SingleSpaceTokenizer, Tokenizer};
use crate::traits::{DocId, DocumentIndex, Hit, DEFAULT_INDEX_MAX_BUFFERED_DOCS};

const NEXT_ID_KEY: &str = "next_id";
const SEPARATOR: u8 = 0x00;
const ID_LEN: usize = 8;

/// Persistent inverted index stored in an LMDB environment.
///
/// # Example
///
/// ```ignore
/// use lexcache_index::{DocumentIndex, Document, Field, LmdbIndex, Query};
///
/// let mut index = LmdbIndex::open("/tmp/lexcache/pages", 64)?;
/// index.add_document(Document::new().with_field(Field::keyword("identifier", "page_1")))?;
/// index.commit()?;
/// let hits = index.find(&Query::term("identifier", "page_1"))?;
/// ```
pub struct LmdbIndex {
    env: Env,
    documents: Database<U64<BigEndian>, SerdeBincode<StoredDocument>>,
    postings: Database<Bytes, Unit>,
    numeric: Database<Bytes, Unit>,
    meta: Database<Str, U64<BigEndian>>,
    path: PathBuf,
    pending: PendingChanges,
    next_id: u64,
    max_buffered_docs: usize,
    tokenizer: Box<dyn Tokenizer>,
}

impl LmdbIndex {
    /// Open the index in `path`, creating the directory and databases when
    /// they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The LMDB environment cannot be opened
    /// - A database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> IndexResult<Self> {
        Self::open_with_tokenizer(path, map_size_mb, Box::new(SingleSpaceTokenizer))
    }

    pub fn open_with_tokenizer<P: AsRef<Path>>(
        path: P,
        map_size_mb: usize,
        tokenizer: Box<dyn Tokenizer>,
    ) -> IndexResult<Self> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb.max(1) * 1024 * 1024)
                .max_dbs(4)
                .open(path.as_ref())
        }
        .map_err(|e| IndexError::Open {
            path: path.as_ref().to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(write_error)?;

        let documents = env
            .create_database(&mut wtxn, Some("documents"))
            .map_err(|e| table_error("documents", e))?;
        let postings = env
            .create_database(&mut wtxn, Some("postings"))
            .map_err(|e| table_error("postings", e))?;
        let numeric = env
            .create_database(&mut wtxn, Some("numeric"))
            .map_err(|e| table_error("numeric", e))?;
        let meta: Database<Str, U64<BigEndian>> = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(|e| table_error("meta", e))?;

        let next_id = meta
            .get(&wtxn, NEXT_ID_KEY)
            .map_err(read_error)?
            .unwrap_or(0);

        wtxn.commit().map_err(write_error)?;

        tracing::debug!(path = %path.as_ref().display(), next_id, "Opened LMDB document index");

        Ok(Self {
            env,
            documents,
            postings,
            numeric,
            meta,
            path: path.as_ref().to_path_buf(),
            pending: PendingChanges::default(),
            next_id,
            max_buffered_docs: DEFAULT_INDEX_MAX_BUFFERED_DOCS,
            tokenizer,
        })
    }

    /// Directory holding the environment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write pending changes in one transaction. Pending state is only
    /// dropped once the transaction committed.
    fn flush_pending(&mut self) -> IndexResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut wtxn = self.env.write_txn().map_err(write_error)?;

        for id in &self.pending.deletes {
            let stored = self
                .documents
                .get(&wtxn, &id.as_u64())
                .map_err(read_error)?;
            let Some(stored) = stored else {
                continue;
            };
            for term in &stored.terms {
                let key = index_key(term, *id);
                let db = self.term_db(term);
                db.delete(&mut wtxn, &key)
                    .map_err(write_error)?;
            }
            self.documents
                .delete(&mut wtxn, &id.as_u64())
                .map_err(write_error)?;
        }

        for (id, stored) in &self.pending.adds {
            self.documents
                .put(&mut wtxn, &id.as_u64(), stored)
                .map_err(|e| IndexError::Document {
                    id: *id,
                    reason: e.to_string(),
                })?;
            for term in &stored.terms {
                let key = index_key(term, *id);
                let db = self.term_db(term);
                db.put(&mut wtxn, &key, &())
                    .map_err(write_error)?;
            }
        }

        self.meta
            .put(&mut wtxn, NEXT_ID_KEY, &self.next_id)
            .map_err(write_error)?;

        wtxn.commit().map_err(write_error)?;

        tracing::trace!(
            added = self.pending.adds.len(),
            deleted = self.pending.deletes.len(),
            "Committed LMDB index"
        );
        self.pending = PendingChanges::default();
        Ok(())
    }

    fn term_db(&self, term: &IndexTerm) -> Database<Bytes, Unit> {
        match term {
            IndexTerm::Term { .. } => self.postings,
            IndexTerm::Numeric { .. } => self.numeric,
        }
    }

    fn is_committed(&self, txn: &RoTxn<'_>, id: DocId) -> IndexResult<bool> {
        self.documents
            .get(txn, &id.as_u64())
            .map(|doc| doc.is_some())
            .map_err(read_error)
    }
}

impl DocumentIndex for LmdbIndex {
    fn add_document(&mut self, document: Document) -> IndexResult<DocId> {
        let id = DocId::new(self.next_id);
        self.next_id += 1;
        self.pending.add(id, document.analyze(self.tokenizer.as_ref()));
        if self.pending.pending_adds() >= self.max_buffered_docs {
            self.flush_pending()?;
        }
        Ok(id)
    }

    fn delete(&mut self, id: DocId) -> IndexResult<()> {
        let pending_add = self.pending.adds.iter().any(|(pending, _)| *pending == id);
        if pending_add {
            self.pending.delete(id);
            return Ok(());
        }

        let rtxn = self.env.read_txn().map_err(read_error)?;
        if self.is_committed(&rtxn, id)? {
            self.pending.delete(id);
        }
        Ok(())
    }

    fn commit(&mut self) -> IndexResult<()> {
        self.flush_pending()
    }

    fn discard_pending_additions(&mut self) -> usize {
        self.pending.discard_adds()
    }

    fn find(&self, query: &Query) -> IndexResult<Vec<Hit>> {
        let rtxn = self.env.read_txn().map_err(read_error)?;
        let snapshot = Snapshot {
            index: self,
            txn: &rtxn,
        };
        let ids = evaluate(query, &snapshot)?;

        let mut hits = Vec::with_capacity(ids.len());
        for id in ids {
            if self.pending.is_deleted(id) {
                continue;
            }
            let stored = self
                .documents
                .get(&rtxn, &id.as_u64())
                .map_err(|e| IndexError::Document {
                    id,
                    reason: e.to_string(),
                })?;
            if let Some(stored) = stored {
                hits.push(Hit {
                    id,
                    document: stored.document,
                });
            }
        }
        Ok(hits)
    }

    fn optimize(&mut self) -> IndexResult<()> {
        self.flush_pending()?;
        self.env
            .force_sync()
            .map_err(write_error)
    }

    fn max_buffered_docs(&self) -> usize {
        self.max_buffered_docs
    }

    fn set_max_buffered_docs(&mut self, max: usize) {
        self.max_buffered_docs = max.max(1);
    }

    fn count(&self) -> IndexResult<usize> {
        let rtxn = self.env.read_txn().map_err(read_error)?;
        let total = self
            .documents
            .len(&rtxn)
            .map_err(read_error)?;
        let total = usize::try_from(total).unwrap_or(usize::MAX);
        Ok(total.saturating_sub(self.pending.deletes.len()))
    }

    fn has_uncommitted_changes(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Drop for LmdbIndex {
    fn drop(&mut self) {
        if let Err(e) = self.flush_pending() {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to commit pending index changes on drop"
            );
        }
    }
}

fn read_error(e: heed::Error) -> IndexError {
    IndexError::Read(e.to_string())
}

fn write_error(e: heed::Error) -> IndexError {
    IndexError::Write(e.to_string())
}

fn table_error(table: &'static str, e: heed::Error) -> IndexError {
    IndexError::Table {
        table,
        reason: e.to_string(),
    }
}

/// Read view used to evaluate one query.
struct Snapshot<'i, 't> {
    index: &'i LmdbIndex,
    txn: &'t RoTxn<'i>,
}

impl Snapshot<'_, '_> {
    /// Collect ids from every key under `prefix` that passes `accept`.
    fn scan<F>(&self, db: Database<Bytes, Unit>, prefix: &[u8], mut accept: F) -> IndexResult<BTreeSet<DocId>>
    where
        F: FnMut(&[u8]) -> Scan,
    {
        let iter = db
            .prefix_iter(self.txn, prefix)
            .map_err(read_error)?;

        let mut ids = BTreeSet::new();
        for result in iter {
            let (key, _) = result.map_err(read_error)?;
            match accept(key) {
                Scan::Take => {
                    if let Some(id) = trailing_id(key) {
                        ids.insert(id);
                    }
                }
                Scan::Skip => {}
                Scan::Stop => break,
            }
        }
        Ok(ids)
    }
}

enum Scan {
    Take,
    Skip,
    Stop,
}

impl TermSource for Snapshot<'_, '_> {
    fn term_docs(&self, field: &str, term: &str) -> IndexResult<BTreeSet<DocId>> {
        let prefix = term_prefix(field, term);
        let exact_len = prefix.len() + ID_LEN;
        self.scan(self.index.postings, &prefix, |key| {
            if key.len() == exact_len {
                Scan::Take
            } else {
                Scan::Skip
            }
        })
    }

    fn range_docs(
        &self,
        field: &str,
        lower: Bound<i64>,
        upper: Bound<i64>,
    ) -> IndexResult<BTreeSet<DocId>> {
        let prefix = field_prefix(field);
        let exact_len = prefix.len() + 2 * ID_LEN;
        self.scan(self.index.numeric, &prefix, |key| {
            if key.len() != exact_len {
                return Scan::Skip;
            }
            let value = decode_sortable(&key[prefix.len()..prefix.len() + ID_LEN]);
            if in_range(value, lower, upper) {
                Scan::Take
            } else if past_upper(value, upper) {
                Scan::Stop
            } else {
                Scan::Skip
            }
        })
    }

    fn wildcard_docs(
        &self,
        field: &str,
        pattern: &str,
        matcher: &WildcardMatcher,
    ) -> IndexResult<BTreeSet<DocId>> {
        let field_len = field.len() + 1;
        let mut prefix = field_prefix(field);
        prefix.extend_from_slice(WildcardMatcher::literal_prefix(pattern).as_bytes());
        self.scan(self.index.postings, &prefix, |key| {
            if key.len() < field_len + 1 + ID_LEN || key[key.len() - ID_LEN - 1] != SEPARATOR {
                return Scan::Skip;
            }
            match std::str::from_utf8(&key[field_len..key.len() - ID_LEN - 1]) {
                Ok(term) if matcher.matches(term) => Scan::Take,
                _ => Scan::Skip,
            }
        })
    }
}

// ============================================================================
// KEY ENCODING
// ============================================================================

fn field_prefix(field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + 2 * ID_LEN);
    key.extend_from_slice(field.as_bytes());
    key.push(SEPARATOR);
    key
}

fn term_prefix(field: &str, term: &str) -> Vec<u8> {
    let mut key = field_prefix(field);
    key.extend_from_slice(term.as_bytes());
    key.push(SEPARATOR);
    key
}

fn index_key(term: &IndexTerm, id: DocId) -> Vec<u8> {
    let mut key = match term {
        IndexTerm::Term { field, term } => term_prefix(field, term),
        IndexTerm::Numeric { field, value } => {
            let mut key = field_prefix(field);
            key.extend_from_slice(&encode_sortable(*value));
            key
        }
    };
    key.extend_from_slice(&id.as_u64().to_be_bytes());
    key
}

fn trailing_id(key: &[u8]) -> Option<DocId> {
    let start = key.len().checked_sub(ID_LEN)?;
    let bytes: [u8; ID_LEN] = key[start..].try_into().ok()?;
    Some(DocId::new(u64::from_be_bytes(bytes)))
}

/// Big-endian with the sign bit flipped, so byte order equals numeric order.
fn encode_sortable(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_sortable(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    (u64::from_be_bytes(buf) ^ (1 << 63)) as i64
}

fn past_upper(value: i64, upper: Bound<i64>) -> bool {
    match upper {
        Bound::Included(max) => value > max,
        Bound::Excluded(max) => value >= max,
        Bound::Unbounded => false,
    }
}
