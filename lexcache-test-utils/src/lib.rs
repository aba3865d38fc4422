//! lexcache Test Utilities
//!
//! Shared test infrastructure for the lexcache workspace:
//! - Proptest generators for identifiers, tags, payloads and lifetimes
//! - Fixtures for in-memory and LMDB-backed caches with a pinned clock
//! - Custom assertions for cache results
//! - Tracing setup for test output

// Re-export the types tests touch most
pub use lexcache_core::{
    CacheEntry, CacheError, CacheOptions, CacheResult, ExecutionClock, ExpiryStrategy,
    UnixTimestamp, UNLIMITED_EXPIRES_AT,
};
pub use lexcache_index::{DocumentIndex, LmdbIndex, MemoryIndex, Query};
pub use lexcache_storage::{CacheBackend, CountingObserver, LexCache};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fixed "now" used by fixtures so expiry arithmetic is reproducible.
pub const FIXED_NOW: UnixTimestamp = 1_700_000_000;

/// Install a test-friendly subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to debug output for the lexcache crates.
/// Repeated calls are harmless.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lexcache_storage=debug,lexcache_index=debug,warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use super::*;
    use proptest::prelude::*;

    /// Cache identifiers as a frontend would produce them.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_]{1,24}"
    }

    /// One tag: no spaces, since tags are indexed split on single spaces.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,11}"
    }

    /// Up to four distinct tags.
    pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_tag(), 0..4).prop_map(|set| set.into_iter().collect())
    }

    /// Opaque payload bytes.
    pub fn arb_content() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..256)
    }

    /// Positive lifetimes in seconds.
    pub fn arb_lifetime() -> impl Strategy<Value = i64> {
        1i64..1_000_000
    }

    /// A full entry expiring relative to [`FIXED_NOW`].
    pub fn arb_entry() -> impl Strategy<Value = CacheEntry> {
        (arb_identifier(), arb_content(), arb_tags(), arb_lifetime()).prop_map(
            |(identifier, content, tags, lifetime)| {
                CacheEntry::new(identifier, content, tags, FIXED_NOW + lifetime)
            },
        )
    }

    pub fn arb_expiry_strategy() -> impl Strategy<Value = ExpiryStrategy> {
        prop_oneof![Just(ExpiryStrategy::Lazy), Just(ExpiryStrategy::Query)]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built caches for common testing scenarios.

    use super::*;
    use tempfile::TempDir;

    /// In-memory cache with its clock pinned to [`FIXED_NOW`].
    pub fn memory_cache(options: CacheOptions) -> LexCache<MemoryIndex> {
        let mut cache = LexCache::in_memory(options).expect("in-memory cache should build");
        cache.set_clock(ExecutionClock::at(FIXED_NOW));
        cache
    }

    /// LMDB-backed cache in a fresh temporary directory.
    ///
    /// The directory is removed when the returned [`TempDir`] is dropped, so
    /// keep it alive for as long as the cache.
    pub fn lmdb_cache(options: CacheOptions) -> (LexCache<LmdbIndex>, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let cache = reopen_lmdb_cache(&temp_dir, options);
        (cache, temp_dir)
    }

    /// Open (again) the cache living in `temp_dir`.
    pub fn reopen_lmdb_cache(temp_dir: &TempDir, options: CacheOptions) -> LexCache<LmdbIndex> {
        let options = options.with_storage_root(temp_dir.path()).with_map_size_mb(16);
        let mut cache = LexCache::open("test", options).expect("LMDB cache should open");
        cache.set_clock(ExecutionClock::at(FIXED_NOW));
        cache
    }

    /// Store `entry` through the public API, preserving its absolute expiry.
    pub fn store_entry<I: DocumentIndex>(cache: &mut LexCache<I>, entry: &CacheEntry) {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        let lifetime = entry.expires_at - cache.clock().now();
        cache
            .set(&entry.identifier, &entry.content, &tags, Some(lifetime))
            .expect("set should succeed");
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache results.

    use super::*;

    /// Assert that `identifier` resolves to `expected`.
    #[track_caller]
    pub fn assert_cached<B: CacheBackend>(cache: &mut B, identifier: &str, expected: &[u8]) {
        match cache.get(identifier) {
            Ok(Some(content)) => assert_eq!(
                content, expected,
                "Content mismatch for {identifier}"
            ),
            other => panic!("Expected {identifier} to be cached, got: {other:?}"),
        }
        assert!(
            matches!(cache.has(identifier), Ok(true)),
            "has({identifier}) should be true"
        );
    }

    /// Assert that `identifier` is absent.
    #[track_caller]
    pub fn assert_missing<B: CacheBackend>(cache: &mut B, identifier: &str) {
        match cache.get(identifier) {
            Ok(None) => {}
            other => panic!("Expected {identifier} to be missing, got: {other:?}"),
        }
        assert!(
            matches!(cache.has(identifier), Ok(false)),
            "has({identifier}) should be false"
        );
    }

    /// Assert that a result is an InvalidPayload error.
    #[track_caller]
    pub fn assert_invalid_payload<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::InvalidPayload { .. }) => {}
            other => panic!("Expected InvalidPayload error, got: {:?}", other),
        }
    }
}
