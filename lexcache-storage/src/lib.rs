//! lexcache Storage - Cache Engine
//!
//! A taggable cache backend whose persistent store is an inverted document
//! index. Writes are buffered and committed in batches; entries can be
//! invalidated by identifier, by tag, or all at once, and expire by
//! absolute timestamp.

pub mod buffer;
pub mod codec;
pub mod engine;
pub mod expiry;
pub mod observer;
pub mod schema;
pub mod traits;

pub use buffer::WriteBuffer;
pub use codec::{PayloadCodec, DEFAULT_COMPRESSION_LEVEL};
pub use engine::LexCache;
pub use expiry::{ExpiryPolicy, HitState};
pub use observer::{
    CacheEvent, CacheMetrics, CacheObserver, CountingObserver, NoopObserver, TracingObserver,
};
pub use traits::CacheBackend;

pub use lexcache_core::{CacheError, CacheOptions, CacheResult, ExecutionClock, ExpiryStrategy};
pub use lexcache_index::{LmdbIndex, MemoryIndex};
