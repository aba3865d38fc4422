//! Cache backend contract.
//!
//! The surface a host cache manager talks to. Payloads are opaque bytes;
//! serializing values is the caller's job.

use lexcache_core::CacheResult;

/// A taggable cache backend.
///
/// All operations take `&mut self` and complete synchronously. Hosts that
/// share a backend across threads wrap it in a mutex.
pub trait CacheBackend {
    /// Store `content` under `identifier`, replacing any previous entry.
    ///
    /// `lifetime` is in seconds: `None` uses the configured default, `0`
    /// never expires, and a negative value makes the call a no-op.
    ///
    /// # Errors
    ///
    /// A payload that cannot be encoded is rejected before anything is
    /// buffered. If the write fills the buffer and the resulting commit
    /// fails, the error is returned but the entry stays buffered with the
    /// rest of the batch, and the next commit retries it.
    fn set(
        &mut self,
        identifier: &str,
        content: &[u8],
        tags: &[&str],
        lifetime: Option<i64>,
    ) -> CacheResult<()>;

    /// Content of the live entry, or `None`.
    fn get(&mut self, identifier: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Whether a live entry exists.
    fn has(&mut self, identifier: &str) -> CacheResult<bool>;

    /// Remove an entry. Returns whether anything was removed.
    fn remove(&mut self, identifier: &str) -> CacheResult<bool>;

    /// Remove every entry.
    fn flush(&mut self) -> CacheResult<()>;

    /// Remove every entry carrying `tag`.
    fn flush_by_tag(&mut self, tag: &str) -> CacheResult<()>;

    /// Remove every entry carrying at least one of `tags`.
    fn flush_by_tags(&mut self, tags: &[&str]) -> CacheResult<()>;

    /// Identifiers of the live entries carrying `tag`.
    fn find_identifiers_by_tag(&mut self, tag: &str) -> CacheResult<Vec<String>>;

    /// Delete expired entries from the store.
    fn collect_garbage(&mut self) -> CacheResult<()>;
}
