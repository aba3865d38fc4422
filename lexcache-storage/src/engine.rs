//! Buffered, tag-indexed cache engine.
//!
//! Writes are staged in a [`WriteBuffer`] and written to the document index
//! in batches. Reads consult the buffer first and fall back to the index.
//!
//! # Commit protocol
//!
//! The index cannot update a document in place, so a commit:
//! 1. optionally raises the index's own pending threshold so the batch is
//!    written in one go (restored afterwards, also on error),
//! 2. deletes every indexed document for each buffered identifier,
//! 3. adds one document per buffered entry,
//! 4. commits the index,
//! 5. clears the buffer, only once step 4 succeeded.
//!
//! When any step fails, the additions queued by this attempt are discarded
//! from the index so a retry cannot leave two documents for one identifier.
//!
//! # Time
//!
//! All expiry decisions use the engine's [`ExecutionClock`], captured when the
//! engine is built and replaced only through [`LexCache::set_clock`].

use std::sync::Arc;

use lexcache_core::{
    CacheEntry, CacheError, CacheOptions, CacheResult, ExecutionClock, ExpiryStrategy,
    UnixTimestamp,
};
use lexcache_index::{
    DocId, Document, DocumentIndex, Hit, LmdbIndex, MemoryIndex, Query, SingleSpaceTokenizer,
    Tokenizer,
};

use crate::buffer::WriteBuffer;
use crate::codec::PayloadCodec;
use crate::expiry::{ExpiryPolicy, HitState};
use crate::observer::{CacheEvent, CacheObserver, NoopObserver};
use crate::schema;
use crate::traits::CacheBackend;

/// Cache engine over a document index.
///
/// # Example
///
/// ```ignore
/// use lexcache_core::CacheOptions;
/// use lexcache_storage::{CacheBackend, LexCache};
///
/// let mut cache = LexCache::open("pages", CacheOptions::from_env())?;
/// cache.set("page_1", b"<html>", &["pageId_1"], Some(3600))?;
/// assert!(cache.has("page_1")?);
///
/// cache.flush_by_tag("pageId_1")?;
/// cache.close()?;
/// ```
pub struct LexCache<I: DocumentIndex = LmdbIndex> {
    index: I,
    buffer: WriteBuffer,
    options: CacheOptions,
    codec: PayloadCodec,
    expiry: ExpiryPolicy,
    clock: ExecutionClock,
    observer: Arc<dyn CacheObserver>,
    closed: bool,
}

impl LexCache<LmdbIndex> {
    /// Open the persistent cache for `context`.
    ///
    /// The index lives in the configured directory, or in
    /// `<storage_root>/<context>/<index_name>` when none is set. The directory
    /// is created when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The index cannot be opened
    /// - Compression is enabled on a build without the `compression` feature
    pub fn open(context: &str, options: CacheOptions) -> CacheResult<Self> {
        let directory = options.resolve_directory(context);
        std::fs::create_dir_all(&directory).map_err(|e| CacheError::DirectoryCreationFailed {
            path: directory.clone(),
            reason: e.to_string(),
        })?;

        let index = LmdbIndex::open(&directory, options.map_size_mb())?;
        tracing::debug!(
            context,
            directory = %directory.display(),
            "Opened lexcache index"
        );
        Self::with_index(index, options)
    }
}

impl LexCache<MemoryIndex> {
    /// Non-persistent cache, mostly for tests and short-lived processes.
    pub fn in_memory(options: CacheOptions) -> CacheResult<Self> {
        Self::with_index(MemoryIndex::new(), options)
    }
}

impl<I: DocumentIndex> LexCache<I> {
    /// Build an engine over an already opened index.
    pub fn with_index(index: I, options: CacheOptions) -> CacheResult<Self> {
        let codec = PayloadCodec::new(options.compression(), options.compression_level())?;
        let expiry = ExpiryPolicy::new(options.default_lifetime(), options.expiry_strategy());

        Ok(Self {
            index,
            buffer: WriteBuffer::new(),
            options,
            codec,
            expiry,
            clock: ExecutionClock::capture(),
            observer: Arc::new(NoopObserver),
            closed: false,
        })
    }

    /// Install a metric observer.
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the execution clock, e.g. at the start of a new request.
    pub fn set_clock(&mut self, clock: ExecutionClock) {
        self.clock = clock;
    }

    pub fn clock(&self) -> ExecutionClock {
        self.clock
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Direct access to the index. Changes made here bypass the buffer.
    pub fn index_mut(&mut self) -> &mut I {
        &mut self.index
    }

    /// Number of entries waiting for the next commit.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Store a dynamically typed payload. Only JSON strings are accepted.
    pub fn set_value(
        &mut self,
        identifier: &str,
        value: &serde_json::Value,
        tags: &[&str],
        lifetime: Option<i64>,
    ) -> CacheResult<()> {
        match value {
            serde_json::Value::String(content) => {
                self.set(identifier, content.as_bytes(), tags, lifetime)
            }
            other => Err(CacheError::InvalidPayload {
                reason: format!("only strings can be cached, got {}", json_kind(other)),
            }),
        }
    }

    /// Write the buffer to the index.
    ///
    /// A no-op when nothing is buffered. On failure the buffer is kept and
    /// the index drops this attempt's additions, so a later commit retries
    /// the whole batch.
    pub fn commit(&mut self) -> CacheResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let count = self.buffer.len();
        let tune = self.options.tune_batch_size();
        let previous = self.index.max_buffered_docs();
        if tune {
            self.index
                .set_max_buffered_docs(previous.max(count + self.options.commit_margin()));
        }

        let result = self.write_buffer();

        if tune {
            self.index.set_max_buffered_docs(previous);
        }
        if let Err(e) = result {
            let discarded = self.index.discard_pending_additions();
            tracing::warn!(
                index = self.options.index_name(),
                buffered = count,
                discarded,
                error = %e,
                "Cache commit failed, keeping buffer for retry"
            );
            return Err(e);
        }

        self.buffer.clear();
        tracing::debug!(
            index = self.options.index_name(),
            committed = count,
            "Committed cache buffer"
        );
        Ok(())
    }

    /// Commit everything and release the engine.
    ///
    /// Dropping the engine does the same, but can only log failures.
    pub fn close(mut self) -> CacheResult<()> {
        let result = self.shutdown();
        self.closed = true;
        result
    }

    fn shutdown(&mut self) -> CacheResult<()> {
        self.commit()?;
        self.index.commit()?;
        Ok(())
    }

    fn write_buffer(&mut self) -> CacheResult<()> {
        for identifier in self.buffer.identifiers() {
            let hits = self.index.find(&identifier_query(identifier))?;
            for hit in hits {
                self.index.delete(hit.id)?;
            }
        }

        for entry in self.buffer.entries() {
            self.index.add_document(schema::entry_document(entry))?;
        }

        self.index.commit()?;
        Ok(())
    }

    /// Run `query` and keep only live hits.
    ///
    /// Under the lazy strategy stale hits are deleted on the way.
    fn live_hits(&mut self, query: Query) -> CacheResult<Vec<Hit>> {
        let now = self.clock.now();
        let query = self.expiry.freshness_query(query, now);
        let hits = self.index.find(&query)?;

        let mut live = Vec::with_capacity(hits.len());
        let mut stale = Vec::new();
        for hit in hits {
            match self.expiry.classify(&hit.document, now) {
                HitState::Live => live.push(hit),
                HitState::Expired => stale.push(hit.id),
                HitState::Legacy => {
                    tracing::warn!(
                        doc = %hit.id,
                        identifier = schema::identifier(&hit.document).unwrap_or_default(),
                        "Unreadable document treated as expired"
                    );
                    stale.push(hit.id);
                }
            }
        }

        if self.expiry.strategy() == ExpiryStrategy::Lazy && !stale.is_empty() {
            for id in &stale {
                self.index.delete(*id)?;
            }
            self.index.commit()?;
            tracing::debug!(expired = stale.len(), "Deleted expired documents");
        }

        Ok(live)
    }

    /// First live indexed document for `identifier`.
    fn find_live(&mut self, identifier: &str) -> CacheResult<Option<Document>> {
        let hits = self.live_hits(identifier_query(identifier))?;
        Ok(hits.into_iter().next().map(|hit| hit.document))
    }

    /// Delete every document without a readable expiry or payload and commit.
    ///
    /// Such documents never match the expiry range, so they are found by
    /// scanning all identifiers.
    fn delete_unreadable(&mut self, now: UnixTimestamp) -> CacheResult<usize> {
        let hits = self.index.find(&Query::wildcard(schema::FIELD_IDENTIFIER, "*"))?;
        let unreadable: Vec<DocId> = hits
            .into_iter()
            .filter(|hit| self.expiry.classify(&hit.document, now) == HitState::Legacy)
            .map(|hit| hit.id)
            .collect();
        for id in &unreadable {
            self.index.delete(*id)?;
        }
        self.index.commit()?;
        Ok(unreadable.len())
    }

    /// Delete everything `query` matches and commit. Returns the count.
    fn delete_matching(&mut self, query: &Query) -> CacheResult<usize> {
        let hits = self.index.find(query)?;
        let count = hits.len();
        for hit in hits {
            self.index.delete(hit.id)?;
        }
        self.index.commit()?;
        Ok(count)
    }
}

impl<I: DocumentIndex> CacheBackend for LexCache<I> {
    fn set(
        &mut self,
        identifier: &str,
        content: &[u8],
        tags: &[&str],
        lifetime: Option<i64>,
    ) -> CacheResult<()> {
        let Some(expires_at) = self.expiry.resolve(self.clock.now(), lifetime) else {
            tracing::trace!(identifier, ?lifetime, "Skipping write with negative lifetime");
            return Ok(());
        };

        let content = self.codec.encode(content)?;
        let tags = tags.iter().map(|tag| tag.to_string()).collect();
        self.buffer
            .insert(CacheEntry::new(identifier, content, tags, expires_at));
        self.observer.record(CacheEvent::Insert);

        if self.buffer.len() > self.options.max_buffered_docs() {
            self.commit()?;
        }
        Ok(())
    }

    fn get(&mut self, identifier: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        if let Some(entry) = self.buffer.get(identifier) {
            if !entry.is_live(now) {
                return Ok(None);
            }
            let content = self.codec.decode(&entry.content)?;
            self.observer.record(CacheEvent::Hit);
            return Ok(Some(content));
        }

        let Some(document) = self.find_live(identifier)? else {
            return Ok(None);
        };
        let Some(encoded) = schema::content(&document) else {
            return Ok(None);
        };
        let content = self.codec.decode(encoded)?;
        self.observer.record(CacheEvent::Hit);
        Ok(Some(content))
    }

    fn has(&mut self, identifier: &str) -> CacheResult<bool> {
        if let Some(entry) = self.buffer.get(identifier) {
            return Ok(entry.is_live(self.clock.now()));
        }
        Ok(self.find_live(identifier)?.is_some())
    }

    fn remove(&mut self, identifier: &str) -> CacheResult<bool> {
        let mut removed = false;
        if self.buffer.remove(identifier).is_some() {
            removed = true;
            self.observer.record(CacheEvent::Remove);
        }

        for hit in self.index.find(&identifier_query(identifier))? {
            self.index.delete(hit.id)?;
            removed = true;
            self.observer.record(CacheEvent::Remove);
        }
        Ok(removed)
    }

    fn flush(&mut self) -> CacheResult<()> {
        self.observer.record(CacheEvent::Flush);
        self.buffer.clear();

        let removed = self.delete_matching(&Query::wildcard(schema::FIELD_IDENTIFIER, "*"))?;
        if self.options.optimize() {
            self.index.optimize()?;
        }
        tracing::info!(index = self.options.index_name(), removed, "Flushed cache");
        Ok(())
    }

    fn flush_by_tag(&mut self, tag: &str) -> CacheResult<()> {
        self.commit()?;
        self.observer.record(CacheEvent::FlushByTag);

        let removed = self.delete_matching(&tag_query(tag))?;
        tracing::info!(tag, removed, "Flushed cache entries by tag");
        Ok(())
    }

    fn flush_by_tags(&mut self, tags: &[&str]) -> CacheResult<()> {
        self.commit()?;
        self.observer.record(CacheEvent::FlushByTags);

        let query = Query::or(tags.iter().map(|tag| tag_query(tag)));
        let removed = self.delete_matching(&query)?;
        tracing::info!(tags = tags.len(), removed, "Flushed cache entries by tags");
        Ok(())
    }

    fn find_identifiers_by_tag(&mut self, tag: &str) -> CacheResult<Vec<String>> {
        self.commit()?;
        let hits = self.live_hits(tag_query(tag))?;
        Ok(hits
            .iter()
            .filter_map(|hit| schema::identifier(&hit.document).map(str::to_string))
            .collect())
    }

    fn collect_garbage(&mut self) -> CacheResult<()> {
        self.commit()?;

        let now = self.clock.now();
        let query = self.expiry.garbage_query(now);
        let expired = self.delete_matching(&query)?;
        let unreadable = self.delete_unreadable(now)?;
        if self.options.optimize() {
            self.index.optimize()?;
        }
        tracing::info!(
            index = self.options.index_name(),
            expired,
            unreadable,
            now,
            "Collected expired cache entries"
        );
        Ok(())
    }
}

impl<I: DocumentIndex> Drop for LexCache<I> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.shutdown() {
            tracing::error!(
                index = self.options.index_name(),
                buffered = self.buffer.len(),
                error = %e,
                "Failed to commit cache on drop"
            );
        }
    }
}

fn identifier_query(identifier: &str) -> Query {
    Query::term(schema::FIELD_IDENTIFIER, identifier)
}

/// Tags are indexed split on single spaces. A tag containing spaces matches
/// documents carrying all of its parts.
fn tag_query(tag: &str) -> Query {
    let mut terms = SingleSpaceTokenizer.tokenize(tag);
    if terms.len() == 1 {
        if let Some(term) = terms.pop() {
            return Query::term(schema::FIELD_TAGS, term);
        }
    }
    Query::and(
        terms
            .into_iter()
            .map(|term| Query::term(schema::FIELD_TAGS, term)),
    )
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
