//! End-to-end cache behavior over a real temporary directory

use diskmemo::{DiskCache, MemoResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn cache(root: &TempDir, salt: &str, ttl: Duration) -> DiskCache {
    DiskCache::new(root.path(), salt)
        .with_ttl(ttl)
        .with_collect_interval(Duration::from_secs(3600))
}

#[test]
fn compute_hit_evict_recompute_cycle() {
    let root = TempDir::new().unwrap();
    let memo = cache(&root, "v1", Duration::from_millis(80));
    let produced = AtomicU32::new(0);
    let produce = || -> MemoResult<Vec<u8>> {
        produced.fetch_add(1, Ordering::SeqCst);
        Ok(b"bar".to_vec())
    };

    // First call computes and persists.
    assert_eq!(memo.lookup_or_compute("foo", produce).unwrap(), b"bar");
    assert_eq!(produced.load(Ordering::SeqCst), 1);

    // Second call is served from disk.
    assert_eq!(memo.lookup_or_compute("foo", produce).unwrap(), b"bar");
    assert_eq!(produced.load(Ordering::SeqCst), 1);

    // Let the entry age past the TTL, collect, and the third call computes
    // again.
    std::thread::sleep(Duration::from_millis(160));
    memo.collect();
    assert_eq!(memo.lookup_or_compute("foo", produce).unwrap(), b"bar");
    assert_eq!(produced.load(Ordering::SeqCst), 2);
}

#[test]
fn instances_sharing_a_root_share_entries() {
    let root = TempDir::new().unwrap();
    let writer = cache(&root, "v1", Duration::from_secs(3600));
    let reader = cache(&root, "v1", Duration::from_secs(3600));

    writer
        .lookup_or_compute("foo", || Ok(b"bar".to_vec()))
        .unwrap();

    // A second instance over the same root and salt, as another process
    // would be, sees the persisted entry without computing.
    let value = reader
        .lookup_or_compute("foo", || panic!("should hit the cache"))
        .unwrap();
    assert_eq!(value, b"bar");
}

#[test]
fn racing_writers_leave_one_complete_entry() {
    let root = TempDir::new().unwrap();
    let memo = cache(&root, "v1", Duration::from_secs(3600));
    let produced = AtomicU32::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let value = memo
                    .lookup_or_compute("foo", || {
                        produced.fetch_add(1, Ordering::SeqCst);
                        Ok(b"bar".to_vec())
                    })
                    .unwrap();
                assert_eq!(value, b"bar");
            });
        }
    });

    // Several producers may have raced, but at least one ran and the final
    // entry is complete.
    assert!(produced.load(Ordering::SeqCst) >= 1);
    let value = memo
        .lookup_or_compute("foo", || panic!("should hit the cache"))
        .unwrap();
    assert_eq!(value, b"bar");
}

#[test]
fn collection_reclaims_abandoned_namespaces() {
    let root = TempDir::new().unwrap();
    let ttl = Duration::from_millis(80);

    // An old compiler version populated its namespace, then versions moved
    // on. The old entries age out through any instance's collection.
    cache(&root, "compiler-0.1", ttl)
        .lookup_or_compute("foo", || Ok(b"old artifact".to_vec()))
        .unwrap();
    std::thread::sleep(Duration::from_millis(160));

    let current = cache(&root, "compiler-0.2", ttl);
    current
        .lookup_or_compute("foo", || Ok(b"new artifact".to_vec()))
        .unwrap();
    current.collect();

    assert!(!root.path().join("compiler-0.1").exists());
}

#[test]
fn large_payload_round_trips() {
    let root = TempDir::new().unwrap();
    let memo = cache(&root, "v1", Duration::from_secs(3600));
    let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();

    let expected = payload.clone();
    memo.lookup_or_compute("big", move || Ok(payload)).unwrap();
    let value = memo
        .lookup_or_compute("big", || panic!("should hit the cache"))
        .unwrap();
    assert_eq!(value, expected);
}
