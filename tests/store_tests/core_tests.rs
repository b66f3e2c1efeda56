//! Core Store Tests
//!
//! Tests verify:
//! - Put/Get/Delete semantics
//! - Overwrite and NotFound handling
//! - Watches are refused without a watch layer
//! - Concurrent readers and writers

use std::sync::Arc;
use std::thread;

use kvwatch::{CoreStore, KvError, KvStore, Value, WatchOp};

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = CoreStore::new();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
}

#[test]
fn test_put_then_get() {
    let store = CoreStore::new();

    store.put("foo", Value::from("bar")).unwrap();

    assert_eq!(store.get("foo").unwrap(), Value::from("bar"));
    assert!(store.contains_key("foo"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_get_missing_is_not_found() {
    let store = CoreStore::new();

    let err = store.get("missing").unwrap_err();
    assert!(matches!(err, KvError::NotFound(ref key) if key == "missing"));
    assert!(err.is_not_found());
}

#[test]
fn test_put_overwrites() {
    let store = CoreStore::new();

    store.put("k", Value::from(1i64)).unwrap();
    store.put("k", Value::from("now a string")).unwrap();

    assert_eq!(store.get("k").unwrap(), Value::from("now a string"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_then_get() {
    let store = CoreStore::new();

    store.put("k", Value::from(true)).unwrap();
    store.delete("k").unwrap();

    assert!(store.get("k").unwrap_err().is_not_found());
    assert!(store.is_empty());
}

#[test]
fn test_delete_missing_is_not_found() {
    let store = CoreStore::new();

    let err = store.delete("ghost").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_empty_key_is_an_ordinary_key() {
    let store = CoreStore::new();

    store.put("", Value::from(7u32)).unwrap();
    assert_eq!(store.get("").unwrap(), Value::U32(7));
}

#[test]
fn test_add_watch_unsupported() {
    let store = CoreStore::new();

    let err = store.add_watch("foo", WatchOp::Put).unwrap_err();
    assert!(matches!(err, KvError::WatchUnsupported));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_and_writers() {
    let store = Arc::new(CoreStore::new());
    let writers = 4;
    let per_writer = 250;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..per_writer {
                    let key = format!("w{}-{}", w, i);
                    store.put(&key, Value::from(i as i64)).unwrap();
                    assert_eq!(store.get(&key).unwrap(), Value::I64(i as i64));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), writers * per_writer);
}
