//! End-to-end tests against the LMDB-backed cache.

use std::sync::Arc;

use lexcache_storage::schema;
use lexcache_test_utils::assertions::{assert_cached, assert_invalid_payload, assert_missing};
use lexcache_test_utils::fixtures::{lmdb_cache, reopen_lmdb_cache};
use lexcache_test_utils::{
    init_tracing, CacheBackend, CacheOptions, CountingObserver, DocumentIndex, ExecutionClock,
    ExpiryStrategy, FIXED_NOW,
};

#[test]
fn test_round_trip_survives_reopen() {
    init_tracing();
    let (mut cache, temp_dir) = lmdb_cache(CacheOptions::new());
    cache.set("page_1", b"<html>1</html>", &["pageId_1", "news"], Some(0)).expect("set");
    cache.set("page_2", b"<html>2</html>", &["pageId_2"], Some(0)).expect("set");
    cache.close().expect("close");

    let mut cache = reopen_lmdb_cache(&temp_dir, CacheOptions::new());
    assert_cached(&mut cache, "page_1", b"<html>1</html>");
    assert_cached(&mut cache, "page_2", b"<html>2</html>");
    assert_eq!(
        cache.find_identifiers_by_tag("news").expect("find"),
        vec!["page_1".to_string()]
    );
}

#[test]
fn test_rewrite_across_sessions_keeps_one_document() {
    let (mut cache, temp_dir) = lmdb_cache(CacheOptions::new());
    cache.set("page_1", b"v1", &[], None).expect("set");
    cache.close().expect("close");

    let mut cache = reopen_lmdb_cache(&temp_dir, CacheOptions::new());
    cache.set("page_1", b"v2", &[], None).expect("set");
    cache.commit().expect("commit");
    cache.commit().expect("commit");

    assert_eq!(cache.index().count().expect("count"), 1);
    assert_cached(&mut cache, "page_1", b"v2");
}

#[test]
fn test_garbage_collection_beyond_one_batch() {
    init_tracing();
    let (mut cache, _temp_dir) = lmdb_cache(CacheOptions::new());
    for i in 0..1030 {
        cache.set(&format!("expired_{i}"), b"x", &["old"], Some(60)).expect("set");
    }
    cache.set("live", b"x", &["new"], Some(0)).expect("set");

    cache.set_clock(ExecutionClock::at(FIXED_NOW + 61));
    cache.collect_garbage().expect("gc");

    assert_eq!(cache.index().count().expect("count"), 1);
    assert_cached(&mut cache, "live", b"x");
    assert!(cache.find_identifiers_by_tag("old").expect("find").is_empty());
}

#[test]
fn test_flush_by_tags_and_flush() {
    let (mut cache, _temp_dir) = lmdb_cache(CacheOptions::new().with_optimize(true));
    cache.set("a", b"1", &["t1"], None).expect("set");
    cache.set("b", b"2", &["t2"], None).expect("set");
    cache.set("c", b"3", &["t3"], None).expect("set");

    cache.flush_by_tags(&["t1", "t3"]).expect("flush");
    assert_missing(&mut cache, "a");
    assert_cached(&mut cache, "b", b"2");
    assert_missing(&mut cache, "c");

    cache.set("d", b"4", &[], None).expect("set");
    cache.flush().expect("flush");
    assert_eq!(cache.index().count().expect("count"), 0);
    assert_missing(&mut cache, "b");
    assert_missing(&mut cache, "d");
}

#[test]
fn test_legacy_documents_are_collected_lazily() {
    let (mut cache, _temp_dir) = lmdb_cache(CacheOptions::new());
    cache
        .index_mut()
        .add_document(schema::legacy_document("legacy", b"x", &["t"], FIXED_NOW + 100))
        .expect("add");
    cache.index_mut().commit().expect("commit");
    cache.set("current", b"y", &["t"], None).expect("set");

    assert_eq!(
        cache.find_identifiers_by_tag("t").expect("find"),
        vec!["current".to_string()]
    );
    assert_eq!(cache.index().count().expect("count"), 1);
    assert_missing(&mut cache, "legacy");
}

#[test]
fn test_garbage_collection_removes_legacy_documents() {
    let (mut cache, _temp_dir) =
        lmdb_cache(CacheOptions::new().with_expiry_strategy(ExpiryStrategy::Query));
    cache
        .index_mut()
        .add_document(schema::legacy_document("legacy", b"x", &["t"], FIXED_NOW - 100))
        .expect("add");
    cache.index_mut().commit().expect("commit");
    cache.set("current", b"y", &["t"], None).expect("set");

    cache.collect_garbage().expect("gc");
    assert_eq!(cache.index().count().expect("count"), 1);
    assert_cached(&mut cache, "current", b"y");
}

#[test]
fn test_query_strategy_leaves_stale_documents_for_gc() {
    let (mut cache, _temp_dir) =
        lmdb_cache(CacheOptions::new().with_expiry_strategy(ExpiryStrategy::Query));
    cache.set("a", b"1", &[], Some(10)).expect("set");
    cache.commit().expect("commit");

    cache.set_clock(ExecutionClock::at(FIXED_NOW + 11));
    assert_missing(&mut cache, "a");
    assert_eq!(cache.index().count().expect("count"), 1);

    cache.collect_garbage().expect("gc");
    assert_eq!(cache.index().count().expect("count"), 0);
}

#[cfg(feature = "compression")]
#[test]
fn test_compressed_entries_round_trip() {
    let (mut cache, temp_dir) = lmdb_cache(
        CacheOptions::new()
            .with_compression(true)
            .with_compression_level(6),
    );
    let content = "<div>cached</div>".repeat(64).into_bytes();
    cache.set("page", &content, &[], Some(0)).expect("set");
    cache.close().expect("close");

    let mut cache = reopen_lmdb_cache(&temp_dir, CacheOptions::new().with_compression(true));
    assert_cached(&mut cache, "page", &content);
}

#[test]
fn test_set_value_rejects_non_strings() {
    let (mut cache, _temp_dir) = lmdb_cache(CacheOptions::new());
    assert_invalid_payload(&cache.set_value("a", &serde_json::json!(42), &[], None));
    assert_invalid_payload(&cache.set_value("a", &serde_json::Value::Null, &[], None));
    assert_missing(&mut cache, "a");
}

#[test]
fn test_observer_counts_events() {
    let observer = Arc::new(CountingObserver::new());
    let (cache, _temp_dir) = lmdb_cache(CacheOptions::new());
    let mut cache = cache.with_observer(observer.clone());

    cache.set("a", b"1", &["t"], None).expect("set");
    cache.set("b", b"2", &["t"], None).expect("set");
    cache.commit().expect("commit");
    assert_cached(&mut cache, "a", b"1");
    cache.flush_by_tag("t").expect("flush");

    let metrics = observer.snapshot();
    assert_eq!(metrics.inserts, 2);
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.flushes_by_tag, 1);
}
