//! Property tests for the cache contract.
//!
//! Run against the in-memory index; the LMDB store shares the same query
//! evaluation and is covered by `lmdb_cache.rs`.

use std::collections::BTreeMap;

use lexcache_test_utils::assertions::{assert_cached, assert_missing};
use lexcache_test_utils::fixtures::{memory_cache, store_entry};
use lexcache_test_utils::generators::{
    arb_content, arb_entry, arb_expiry_strategy, arb_lifetime, arb_tag,
};
use lexcache_test_utils::{
    CacheBackend, CacheEntry, CacheOptions, DocumentIndex, ExecutionClock, FIXED_NOW,
};
use proptest::prelude::*;

fn arb_entries() -> impl Strategy<Value = Vec<CacheEntry>> {
    prop::collection::vec(arb_entry(), 1..20).prop_map(|entries| {
        // one entry per identifier
        let unique: BTreeMap<String, CacheEntry> = entries
            .into_iter()
            .map(|entry| (entry.identifier.clone(), entry))
            .collect();
        unique.into_values().collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_round_trip_before_and_after_commit(
        entries in arb_entries(),
        max_buffered in 0i64..8,
    ) {
        let mut cache = memory_cache(CacheOptions::new().with_max_buffered_docs(max_buffered));
        for entry in &entries {
            store_entry(&mut cache, entry);
        }
        for entry in &entries {
            assert_cached(&mut cache, &entry.identifier, &entry.content);
        }

        cache.commit().expect("commit");
        for entry in &entries {
            assert_cached(&mut cache, &entry.identifier, &entry.content);
        }
        prop_assert_eq!(cache.index().count().expect("count"), entries.len());
    }

    #[test]
    fn prop_last_write_wins(
        writes in prop::collection::vec((0usize..4, arb_content()), 1..30),
        max_buffered in 0i64..6,
    ) {
        let mut cache = memory_cache(CacheOptions::new().with_max_buffered_docs(max_buffered));
        let mut expected = BTreeMap::new();
        for (slot, content) in &writes {
            let identifier = format!("id{slot}");
            cache.set(&identifier, content, &[], None).expect("set");
            expected.insert(identifier, content.clone());
        }

        cache.commit().expect("commit");
        prop_assert_eq!(cache.index().count().expect("count"), expected.len());
        for (identifier, content) in &expected {
            assert_cached(&mut cache, identifier, content);
        }
    }

    #[test]
    fn prop_flush_by_tag_isolation(entries in arb_entries(), tag in arb_tag()) {
        let mut cache = memory_cache(CacheOptions::new());
        for entry in &entries {
            store_entry(&mut cache, entry);
        }

        cache.flush_by_tag(&tag).expect("flush");
        for entry in &entries {
            if entry.has_tag(&tag) {
                assert_missing(&mut cache, &entry.identifier);
            } else {
                assert_cached(&mut cache, &entry.identifier, &entry.content);
            }
        }
    }

    #[test]
    fn prop_flush_by_tags_is_union(
        entries in arb_entries(),
        tags in prop::collection::vec(arb_tag(), 0..3),
    ) {
        let mut cache = memory_cache(CacheOptions::new());
        for entry in &entries {
            store_entry(&mut cache, entry);
        }

        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        cache.flush_by_tags(&tag_refs).expect("flush");
        for entry in &entries {
            if tags.iter().any(|tag| entry.has_tag(tag)) {
                assert_missing(&mut cache, &entry.identifier);
            } else {
                assert_cached(&mut cache, &entry.identifier, &entry.content);
            }
        }
    }

    #[test]
    fn prop_find_identifiers_by_tag_matches_model(
        entries in arb_entries(),
        tag in arb_tag(),
        strategy in arb_expiry_strategy(),
    ) {
        let mut cache = memory_cache(CacheOptions::new().with_expiry_strategy(strategy));
        for entry in &entries {
            store_entry(&mut cache, entry);
        }

        let mut found = cache.find_identifiers_by_tag(&tag).expect("find");
        found.sort();
        let expected: Vec<String> = entries
            .iter()
            .filter(|entry| entry.has_tag(&tag))
            .map(|entry| entry.identifier.clone())
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_expiry_boundary(
        lifetime in arb_lifetime(),
        strategy in arb_expiry_strategy(),
        commit in any::<bool>(),
    ) {
        let mut cache = memory_cache(CacheOptions::new().with_expiry_strategy(strategy));
        cache.set("entry", b"x", &["t"], Some(lifetime)).expect("set");
        if commit {
            cache.commit().expect("commit");
        }

        let expiry = ExecutionClock::at(FIXED_NOW).advanced_by(lifetime);
        cache.set_clock(expiry);
        assert_cached(&mut cache, "entry", b"x");

        cache.set_clock(expiry.advanced_by(1));
        assert_missing(&mut cache, "entry");
        prop_assert!(cache.find_identifiers_by_tag("t").expect("find").is_empty());
    }

    #[test]
    fn prop_remove_then_has(entries in arb_entries(), commit in any::<bool>()) {
        let mut cache = memory_cache(CacheOptions::new());
        for entry in &entries {
            store_entry(&mut cache, entry);
        }
        if commit {
            cache.commit().expect("commit");
        }

        for entry in &entries {
            prop_assert!(cache.remove(&entry.identifier).expect("remove"));
            assert_missing(&mut cache, &entry.identifier);
            prop_assert!(!cache.remove(&entry.identifier).expect("remove"));
        }
    }

    #[test]
    fn prop_flush_is_total(entries in arb_entries(), split in 0usize..20) {
        let mut cache = memory_cache(CacheOptions::new());
        for (i, entry) in entries.iter().enumerate() {
            if i == split {
                cache.commit().expect("commit");
            }
            store_entry(&mut cache, entry);
        }

        cache.flush().expect("flush");
        prop_assert_eq!(cache.buffered_len(), 0);
        prop_assert_eq!(cache.index().count().expect("count"), 0);
        for entry in &entries {
            assert_missing(&mut cache, &entry.identifier);
        }
    }
}
