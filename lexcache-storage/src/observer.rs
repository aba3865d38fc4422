//! Metric hooks.
//!
//! The engine reports one [`CacheEvent`] per observable action. What happens
//! with it is up to the installed [`CacheObserver`]; the default discards it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Actions the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    Insert,
    Hit,
    Remove,
    Flush,
    FlushByTag,
    FlushByTags,
}

impl CacheEvent {
    pub const ALL: [CacheEvent; 6] = [
        Self::Insert,
        Self::Hit,
        Self::Remove,
        Self::Flush,
        Self::FlushByTag,
        Self::FlushByTags,
    ];

    /// Metric name of the event.
    pub fn name(self) -> &'static str {
        match self {
            Self::Insert => "inserts",
            Self::Hit => "hits",
            Self::Remove => "removes",
            Self::Flush => "flushes",
            Self::FlushByTag => "flushes-by-tag",
            Self::FlushByTags => "flushes-by-tags",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of cache events.
pub trait CacheObserver: Send + Sync {
    fn record(&self, event: CacheEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {
    fn record(&self, _event: CacheEvent) {}
}

/// Counts events in memory.
#[derive(Debug, Default)]
pub struct CountingObserver {
    counts: [AtomicU64; 6],
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, event: CacheEvent) -> u64 {
        self.counts[event.slot()].load(Ordering::Relaxed)
    }

    /// Current counts as a plain struct.
    pub fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            inserts: self.count(CacheEvent::Insert),
            hits: self.count(CacheEvent::Hit),
            removes: self.count(CacheEvent::Remove),
            flushes: self.count(CacheEvent::Flush),
            flushes_by_tag: self.count(CacheEvent::FlushByTag),
            flushes_by_tags: self.count(CacheEvent::FlushByTags),
        }
    }
}

impl CacheObserver for CountingObserver {
    fn record(&self, event: CacheEvent) {
        self.counts[event.slot()].fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub inserts: u64,
    pub hits: u64,
    pub removes: u64,
    pub flushes: u64,
    pub flushes_by_tag: u64,
    pub flushes_by_tags: u64,
}

/// Emits every event as a `tracing` event with a prefixed metric name and
/// an increment of one, for collectors that scrape logs.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    prefix: String,
}

impl TracingObserver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn metric_name(&self, event: CacheEvent) -> String {
        format!("{}{}", self.prefix, event.name())
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("lexcache_")
    }
}

impl CacheObserver for TracingObserver {
    fn record(&self, event: CacheEvent) {
        tracing::info!(metric = %self.metric_name(event), value = 1u64, "cache metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let names: Vec<_> = CacheEvent::ALL.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "inserts",
                "hits",
                "removes",
                "flushes",
                "flushes-by-tag",
                "flushes-by-tags"
            ]
        );
    }

    #[test]
    fn test_counting_observer() {
        let observer = CountingObserver::new();
        observer.record(CacheEvent::Hit);
        observer.record(CacheEvent::Hit);
        observer.record(CacheEvent::FlushByTags);

        let metrics = observer.snapshot();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.flushes_by_tags, 1);
        assert_eq!(metrics.inserts, 0);
    }

    #[test]
    fn test_tracing_metric_name() {
        let observer = TracingObserver::default();
        assert_eq!(observer.metric_name(CacheEvent::FlushByTag), "lexcache_flushes-by-tag");
        observer.record(CacheEvent::Insert);
    }
}
