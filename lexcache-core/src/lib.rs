//! lexcache Core - Data Types
//!
//! Entry representation, the execution clock, configuration and the error
//! type shared by every lexcache crate. No storage logic lives here.

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;

pub use clock::{ExecutionClock, UnixTimestamp};
pub use config::{
    sanitize_index_name, CacheOptions, ExpiryStrategy, DEFAULT_INDEX_NAME, DEFAULT_LIFETIME,
    DEFAULT_MAX_BUFFERED_DOCS,
};
pub use entry::{CacheEntry, UNLIMITED_EXPIRES_AT};
pub use error::{CacheError, CacheResult};
