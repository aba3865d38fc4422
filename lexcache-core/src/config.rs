//! Configuration types
//!
//! Options can come from builder methods, from a camelCase options map (the
//! shape cache configurations are usually declared in), or from `LEXCACHE_*`
//! environment variables. Every source goes through the same sanitising
//! rules: bad values are clamped or ignored, never rejected.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default number of entries buffered before an automatic commit.
pub const DEFAULT_MAX_BUFFERED_DOCS: usize = 1000;

/// Default lifetime in seconds for `set` calls without an explicit lifetime.
pub const DEFAULT_LIFETIME: i64 = 3600;

/// Index name used when none (or nothing valid) is configured.
pub const DEFAULT_INDEX_NAME: &str = "default";

static INDEX_NAME_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]").expect("static pattern compiles"));

/// How stale documents are kept out of query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStrategy {
    /// Run the plain query, drop stale hits and delete them on the way.
    #[default]
    Lazy,
    /// Constrain the query itself with a lifetime range.
    Query,
}

/// Options for one cache engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    directory: Option<PathBuf>,
    storage_root: PathBuf,
    index_name: String,
    max_buffered_docs: usize,
    compression: bool,
    compression_level: i32,
    optimize: bool,
    default_lifetime: i64,
    tune_batch_size: bool,
    commit_margin: usize,
    expiry_strategy: ExpiryStrategy,
    map_size_mb: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            directory: None,
            storage_root: PathBuf::from("var/lexcache"),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            max_buffered_docs: DEFAULT_MAX_BUFFERED_DOCS,
            compression: false,
            compression_level: -1,
            optimize: false,
            default_lifetime: DEFAULT_LIFETIME,
            tune_batch_size: true,
            commit_margin: 10,
            expiry_strategy: ExpiryStrategy::Lazy,
            map_size_mb: 256,
        }
    }
}

impl CacheOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a camelCase options map, e.g.
    /// `{"indexName": "pages", "maxBufferedDocs": 500, "compression": true}`.
    ///
    /// Unknown keys are ignored. Wrongly typed values are a deserialization
    /// error; out-of-range values are sanitized like the builder methods do.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw = RawOptions::deserialize(value)?;
        Ok(raw.apply(Self::default()))
    }

    /// Build options from `LEXCACHE_*` environment variables.
    ///
    /// Environment variables:
    /// - `LEXCACHE_DIRECTORY`: explicit index directory
    /// - `LEXCACHE_STORAGE_ROOT`: root for derived directories (default: var/lexcache)
    /// - `LEXCACHE_INDEX_NAME`: index name (default: default)
    /// - `LEXCACHE_MAX_BUFFERED_DOCS`: buffer size before commit (default: 1000)
    /// - `LEXCACHE_COMPRESSION`: "true" or "false" (default: false)
    /// - `LEXCACHE_COMPRESSION_LEVEL`: -1..=9 (default: -1)
    /// - `LEXCACHE_OPTIMIZE`: "true" or "false" (default: false)
    /// - `LEXCACHE_DEFAULT_LIFETIME`: seconds, 0 = unlimited (default: 3600)
    /// - `LEXCACHE_EXPIRY_STRATEGY`: "lazy" or "query" (default: lazy)
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheOptions::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|s| s.trim().eq_ignore_ascii_case("true"));
        let raw = RawOptions {
            directory: lookup("LEXCACHE_DIRECTORY").map(PathBuf::from),
            storage_root: lookup("LEXCACHE_STORAGE_ROOT").map(PathBuf::from),
            index_name: lookup("LEXCACHE_INDEX_NAME"),
            max_buffered_docs: lookup("LEXCACHE_MAX_BUFFERED_DOCS").and_then(|s| s.trim().parse().ok()),
            compression: flag("LEXCACHE_COMPRESSION"),
            compression_level: lookup("LEXCACHE_COMPRESSION_LEVEL").and_then(|s| s.trim().parse().ok()),
            optimize: flag("LEXCACHE_OPTIMIZE"),
            default_lifetime: lookup("LEXCACHE_DEFAULT_LIFETIME").and_then(|s| s.trim().parse().ok()),
            expiry_strategy: lookup("LEXCACHE_EXPIRY_STRATEGY").and_then(|s| {
                match s.trim().to_ascii_lowercase().as_str() {
                    "lazy" => Some(ExpiryStrategy::Lazy),
                    "query" => Some(ExpiryStrategy::Query),
                    _ => None,
                }
            }),
            ..RawOptions::default()
        };
        raw.apply(Self::default())
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Use an explicit index directory instead of the derived one.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the root under which `<context>/<index_name>` directories are derived.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Set the index name. Characters outside `[A-Za-z0-9_-]` are dropped.
    pub fn with_index_name(mut self, name: &str) -> Self {
        self.index_name = sanitize_index_name(name);
        self
    }

    /// Set the buffer size. Negative values are taken by absolute value.
    pub fn with_max_buffered_docs(mut self, max: i64) -> Self {
        self.max_buffered_docs = usize::try_from(max.unsigned_abs()).unwrap_or(usize::MAX);
        self
    }

    /// Enable or disable payload compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set the compression level (-1 = codec default, 0..=9 explicit).
    /// Values outside that range are ignored.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        if (-1..=9).contains(&level) {
            self.compression_level = level;
        }
        self
    }

    /// Compact the index after flush and garbage collection.
    pub fn with_optimize(mut self, enabled: bool) -> Self {
        self.optimize = enabled;
        self
    }

    /// Set the default lifetime in seconds (0 = unlimited).
    pub fn with_default_lifetime(mut self, seconds: i64) -> Self {
        self.default_lifetime = seconds;
        self
    }

    /// Raise the index's own pending-document threshold during commits.
    pub fn with_batch_tuning(mut self, enabled: bool) -> Self {
        self.tune_batch_size = enabled;
        self
    }

    /// Extra headroom added to the identifier count when tuning.
    pub fn with_commit_margin(mut self, margin: usize) -> Self {
        self.commit_margin = margin;
        self
    }

    pub fn with_expiry_strategy(mut self, strategy: ExpiryStrategy) -> Self {
        self.expiry_strategy = strategy;
        self
    }

    /// LMDB map size in megabytes. Zero is ignored.
    pub fn with_map_size_mb(mut self, size: usize) -> Self {
        if size > 0 {
            self.map_size_mb = size;
        }
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn max_buffered_docs(&self) -> usize {
        self.max_buffered_docs
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }

    pub fn default_lifetime(&self) -> i64 {
        self.default_lifetime
    }

    pub fn tune_batch_size(&self) -> bool {
        self.tune_batch_size
    }

    pub fn commit_margin(&self) -> usize {
        self.commit_margin
    }

    pub fn expiry_strategy(&self) -> ExpiryStrategy {
        self.expiry_strategy
    }

    pub fn map_size_mb(&self) -> usize {
        self.map_size_mb
    }

    /// Directory of the index for the given cache context.
    ///
    /// An explicit directory wins; otherwise `<storage_root>/<context>/<index_name>`.
    pub fn resolve_directory(&self, context: &str) -> PathBuf {
        match &self.directory {
            Some(directory) => directory.clone(),
            None => self.storage_root.join(context).join(&self.index_name),
        }
    }
}

/// Strip everything outside `[A-Za-z0-9_-]`; fall back to the default name
/// when nothing is left.
pub fn sanitize_index_name(name: &str) -> String {
    let cleaned = INDEX_NAME_FILTER.replace_all(name, "");
    if cleaned.is_empty() {
        DEFAULT_INDEX_NAME.to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Unvalidated options as they appear in an options map.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawOptions {
    directory: Option<PathBuf>,
    storage_root: Option<PathBuf>,
    index_name: Option<String>,
    max_buffered_docs: Option<i64>,
    compression: Option<bool>,
    compression_level: Option<i32>,
    optimize: Option<bool>,
    default_lifetime: Option<i64>,
    tune_batch_size: Option<bool>,
    commit_margin: Option<usize>,
    expiry_strategy: Option<ExpiryStrategy>,
    map_size_mb: Option<usize>,
}

impl RawOptions {
    fn apply(self, mut options: CacheOptions) -> CacheOptions {
        if let Some(directory) = self.directory {
            options = options.with_directory(directory);
        }
        if let Some(root) = self.storage_root {
            options = options.with_storage_root(root);
        }
        if let Some(name) = self.index_name {
            options = options.with_index_name(&name);
        }
        if let Some(max) = self.max_buffered_docs {
            options = options.with_max_buffered_docs(max);
        }
        if let Some(enabled) = self.compression {
            options = options.with_compression(enabled);
        }
        if let Some(level) = self.compression_level {
            options = options.with_compression_level(level);
        }
        if let Some(enabled) = self.optimize {
            options = options.with_optimize(enabled);
        }
        if let Some(lifetime) = self.default_lifetime {
            options = options.with_default_lifetime(lifetime);
        }
        if let Some(enabled) = self.tune_batch_size {
            options = options.with_batch_tuning(enabled);
        }
        if let Some(margin) = self.commit_margin {
            options = options.with_commit_margin(margin);
        }
        if let Some(strategy) = self.expiry_strategy {
            options = options.with_expiry_strategy(strategy);
        }
        if let Some(size) = self.map_size_mb {
            options = options.with_map_size_mb(size);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let options = CacheOptions::default();
        assert_eq!(options.max_buffered_docs(), 1000);
        assert_eq!(options.compression_level(), -1);
        assert!(!options.compression());
        assert_eq!(options.index_name(), "default");
        assert_eq!(options.expiry_strategy(), ExpiryStrategy::Lazy);
    }

    #[test]
    fn test_index_name_is_sanitized() {
        let options = CacheOptions::new().with_index_name("pages/../../etc passwd!");
        assert_eq!(options.index_name(), "pagesetcpasswd");
        assert_eq!(sanitize_index_name("news_v2-de"), "news_v2-de");
        assert_eq!(sanitize_index_name("../"), "default");
    }

    #[test]
    fn test_compression_level_out_of_range_is_ignored() {
        let options = CacheOptions::new().with_compression_level(6);
        assert_eq!(options.compression_level(), 6);
        let options = options.with_compression_level(10).with_compression_level(-2);
        assert_eq!(options.compression_level(), 6);
        assert_eq!(options.with_compression_level(-1).compression_level(), -1);
    }

    #[test]
    fn test_negative_buffer_size_uses_absolute_value() {
        let options = CacheOptions::new().with_max_buffered_docs(-25);
        assert_eq!(options.max_buffered_docs(), 25);
    }

    #[test]
    fn test_resolve_directory() {
        let options = CacheOptions::new()
            .with_storage_root("/srv/cache")
            .with_index_name("pages");
        assert_eq!(
            options.resolve_directory("Production"),
            PathBuf::from("/srv/cache/Production/pages")
        );

        let explicit = options.with_directory("/tmp/explicit");
        assert_eq!(
            explicit.resolve_directory("Production"),
            PathBuf::from("/tmp/explicit")
        );
    }

    #[test]
    fn test_from_value_sanitizes() {
        let options = CacheOptions::from_value(&json!({
            "indexName": "my index",
            "maxBufferedDocs": -10,
            "compression": true,
            "compressionLevel": 42,
            "optimize": true,
            "expiryStrategy": "query",
            "somethingElse": 1
        }))
        .expect("options map should deserialize");

        assert_eq!(options.index_name(), "myindex");
        assert_eq!(options.max_buffered_docs(), 10);
        assert!(options.compression());
        assert_eq!(options.compression_level(), -1);
        assert!(options.optimize());
        assert_eq!(options.expiry_strategy(), ExpiryStrategy::Query);
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let result = CacheOptions::from_value(&json!({ "maxBufferedDocs": "lots" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LEXCACHE_INDEX_NAME", "news"),
            ("LEXCACHE_MAX_BUFFERED_DOCS", "50"),
            ("LEXCACHE_COMPRESSION", "TRUE"),
            ("LEXCACHE_COMPRESSION_LEVEL", "not-a-number"),
            ("LEXCACHE_EXPIRY_STRATEGY", "Query"),
        ]);
        let options = CacheOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(options.index_name(), "news");
        assert_eq!(options.max_buffered_docs(), 50);
        assert!(options.compression());
        assert_eq!(options.compression_level(), -1);
        assert_eq!(options.expiry_strategy(), ExpiryStrategy::Query);
        assert_eq!(options.default_lifetime(), DEFAULT_LIFETIME);
    }

    proptest! {
        #[test]
        fn prop_sanitized_name_is_safe(name in ".*") {
            let cleaned = sanitize_index_name(&name);
            prop_assert!(!cleaned.is_empty());
            prop_assert!(cleaned
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }

        #[test]
        fn prop_buffer_size_is_absolute(max in any::<i64>()) {
            let options = CacheOptions::new().with_max_buffered_docs(max);
            prop_assert_eq!(options.max_buffered_docs() as u64, max.unsigned_abs());
        }
    }
}
