//! Integration tests for cursors under concurrency and across sessions.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use cursorcache::storage::{FileSwapper, MemorySwapper};
use cursorcache::{CacheConfig, PageCache, PageCursor, PageId, PinFlags};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

/// Number of u64 slots every writer keeps equal.
const SLOTS: usize = 16;

/// Writers keep every slot of a page equal; readers that accept a view with
/// differing slots have seen a torn write that validation should have caught.
///
/// Each writer owns its own pages (even or odd). Two writers filling the same
/// page at once would leave mixed slots behind that are valid to read.
#[test]
fn test_concurrent_readers_never_accept_torn_pages() {
    // Six frames: every thread can hold one while the clock still finds a victim
    let cache = PageCache::new(CacheConfig::new(6));
    let file = cache.map("torn", MemorySwapper::with_pages(8, |_, _| {}));
    let stop = Arc::new(AtomicBool::new(false));

    let mut writers = vec![];
    for w in 0..2u64 {
        let file = file.clone();
        let stop = Arc::clone(&stop);
        writers.push(thread::spawn(move || {
            let mut round = 0i64;
            while !stop.load(Ordering::Relaxed) {
                let page_id = PageId::new((round as u64 * 2 + w) % 8);
                let mut cursor = file.io_write(page_id, PinFlags::new().no_grow()).unwrap();
                assert!(cursor.next().unwrap());
                for _ in 0..SLOTS {
                    cursor.put_long(round).unwrap();
                }
                round += 1;
            }
        }));
    }

    let mut readers = vec![];
    for _ in 0..3 {
        let file = file.clone();
        readers.push(thread::spawn(move || {
            let mut accepted = 0usize;
            for _ in 0..200 {
                let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
                while cursor.next().unwrap() {
                    let slots = loop {
                        let slots: Vec<i64> = (0..SLOTS).map(|_| cursor.get_long()).collect();
                        if !cursor.should_retry().unwrap() {
                            break slots;
                        }
                    };
                    assert!(
                        slots.windows(2).all(|pair| pair[0] == pair[1]),
                        "torn page {} accepted: {slots:?}",
                        cursor.current_page_id()
                    );
                    accepted += 1;
                }
            }
            accepted
        }));
    }

    for reader in readers {
        assert_eq!(reader.join().unwrap(), 200 * 8);
    }
    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
}

/// Concurrent writers to different pages; every page ends with its writer's
/// last value.
#[test]
fn test_concurrent_writers() {
    let cache = PageCache::new(CacheConfig::new(10));
    let file = cache.map("writers", MemorySwapper::with_pages(5, |_, _| {}));

    let mut handles = vec![];
    for i in 0..5u64 {
        let file = file.clone();
        handles.push(thread::spawn(move || {
            for j in 0..50u64 {
                let mut cursor = file.io_write(PageId::new(i), PinFlags::new()).unwrap();
                assert!(cursor.next().unwrap());
                cursor.put_byte_at(0, ((i * 50 + j) % 256) as u8).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    while cursor.next().unwrap() {
        let i = cursor.current_page_id().0;
        assert_eq!(cursor.get_byte_at(0), ((i * 50 + 49) % 256) as u8);
        assert!(!cursor.should_retry().unwrap());
    }
}

/// Pages survive eviction through the swapper when the cache is much
/// smaller than the file.
#[test]
fn test_data_persistence_across_evictions() {
    let cache = PageCache::new(CacheConfig::new(2));
    let swapper = MemorySwapper::new();
    let file = cache.map("evict", swapper.clone());

    {
        let mut cursor = file.io_write(PageId::new(0), PinFlags::new()).unwrap();
        for i in 0u8..5 {
            assert!(cursor.next().unwrap());
            cursor.put_byte_at(0, i).unwrap();
            cursor.put_byte_at(1, i.wrapping_mul(3)).unwrap();
        }
    }

    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    for i in 0u8..5 {
        assert!(cursor.next().unwrap());
        let (first, second) = loop {
            let pair = (cursor.get_byte_at(0), cursor.get_byte_at(1));
            if !cursor.should_retry().unwrap() {
                break pair;
            }
        };
        assert_eq!(first, i);
        assert_eq!(second, i.wrapping_mul(3));
    }
    assert!(!cursor.next().unwrap());

    let stats = cache.stats().snapshot();
    assert!(stats.evictions >= 3);
    assert!(swapper.write_count() >= 3);
}

/// Data written in one session is read back from disk in the next.
#[test]
fn test_flush_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let data = b"persistent!";

    {
        let cache = PageCache::new(CacheConfig::new(10));
        let file = cache.map_path(&path).unwrap();
        let mut cursor = file.io_write(PageId::new(3), PinFlags::new()).unwrap();
        assert!(cursor.next().unwrap());
        cursor.put_bytes(data).unwrap();
        drop(cursor);

        cache.flush_all().unwrap();
        file.unmap().unwrap();
    }

    {
        let cache = PageCache::new(CacheConfig::new(10));
        let file = cache.map("reload", FileSwapper::open(&path).unwrap());
        assert_eq!(file.last_page_id().unwrap(), Some(PageId::new(3)));

        let mut cursor = file.io(PageId::new(3), PinFlags::new()).unwrap();
        assert!(cursor.next().unwrap());
        let mut buf = [0u8; 11];
        cursor.get_bytes(&mut buf);
        assert!(!cursor.should_retry().unwrap());
        assert_eq!(&buf, data);
    }
}

/// Test stats accuracy under load.
#[test]
fn test_stats_accuracy() {
    let cache = PageCache::new(CacheConfig::new(2));
    let file = cache.map("stats", MemorySwapper::with_pages(4, |_, _| {}));

    for _ in 0..5 {
        let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
        assert!(cursor.next().unwrap());
    }
    let stats = cache.stats().snapshot();
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.hits, 4);

    // Force eviction
    let mut cursor = file.io(PageId::new(1), PinFlags::new()).unwrap();
    while cursor.next().unwrap() {}

    let stats = cache.stats().snapshot();
    assert!(stats.evictions >= 1);
    assert_eq!(stats.pages_read, stats.faults);
}
