//! Process-wide cache control surface. Kept in its own test binary: these
//! tests mutate the global cache, and integration test binaries run in their
//! own process.

use std::collections::BTreeMap;

use serde_json::json;
use tracecov::{CacheData, ConstRefEntry};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn global_cache_round_trip_and_clear() {
    init_logs();
    let data = CacheData {
        const_refs: BTreeMap::from([(
            "/repo/lib/foo.rb".to_string(),
            ConstRefEntry {
                digest: "0123456789abcdef".to_string(),
                refs: vec!["BAR".to_string()],
            },
        )]),
        const_locations: BTreeMap::from([("BAR".to_string(), "/repo/lib/bar.rb".to_string())]),
    };

    tracecov::replace_cache(data.clone());
    assert_eq!(tracecov::cache_snapshot(), data);

    // replacement via JSON with one map omitted: the other comes back empty
    tracecov::replace_cache_json(json!({
        "const_locations": { "QUX": "/repo/lib/qux.rb" }
    }))
    .expect("replace from json");
    let snapshot = tracecov::cache_snapshot();
    assert!(snapshot.const_refs.is_empty());
    assert_eq!(
        snapshot.const_locations.get("QUX").map(String::as_str),
        Some("/repo/lib/qux.rb")
    );

    // malformed payloads fail fast and leave the cache untouched
    assert!(tracecov::replace_cache_json(json!(42)).is_err());
    assert!(tracecov::replace_cache_json(json!({ "const_refs": [1, 2] })).is_err());
    assert_eq!(tracecov::cache_snapshot(), snapshot);

    tracecov::clear_cache();
    let cleared = tracecov::cache_snapshot();
    assert!(cleared.const_refs.is_empty());
    assert!(cleared.const_locations.is_empty());
}

#[test]
fn cache_snapshot_serializes_with_both_maps_present() {
    // serde shape check only — independent of global cache content
    let value = serde_json::to_value(CacheData::default()).expect("serialize");
    assert!(value.get("const_refs").is_some());
    assert!(value.get("const_locations").is_some());
}
