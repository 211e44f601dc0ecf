//! Read cursor tests.
//!
//! These cover the advance protocol, the optimistic retry protocol, and the
//! rebind path a reader takes when its frame is evicted underneath it.

use cursorcache::storage::MemorySwapper;
use cursorcache::{
    CacheConfig, Error, PageCache, PageCursor, PageCursorTracer, PageId, PagedFile, PinFlags,
    SwapperId,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// Map a file whose pages carry their own id in byte 0.
fn create_file(frames: usize, pages: u64) -> (PageCache, PagedFile, MemorySwapper) {
    let cache = PageCache::new(CacheConfig::new(frames));
    let swapper = MemorySwapper::with_pages(pages, |id, data| {
        data[0] = id as u8;
        data[8..16].copy_from_slice(&(id * 1000).to_le_bytes());
    });
    let file = cache.map("pages", swapper.clone());
    (cache, file, swapper)
}

/// Run one complete write cycle on `page_id`.
fn write_byte(file: &PagedFile, page_id: PageId, offset: usize, value: u8) {
    let mut writer = file.io_write(page_id, PinFlags::new()).unwrap();
    assert!(writer.next().unwrap());
    writer.put_byte_at(offset, value).unwrap();
}

// ============================================================================
// Advance
// ============================================================================

/// A four page file is read as pages 0, 1, 2, 3 and then ends.
#[test]
fn test_sequential_scan_to_end() {
    let (_cache, file, _) = create_file(8, 4);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();

    for expected in 0..4u64 {
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.current_page_id(), PageId::new(expected));
        loop {
            let tag = cursor.get_byte_at(0);
            let long = cursor.get_long_at(8);
            if !cursor.should_retry().unwrap() {
                assert_eq!(u64::from(tag), expected);
                assert_eq!(long, (expected * 1000) as i64);
                break;
            }
        }
    }

    assert!(!cursor.next().unwrap());
    assert_eq!(cursor.current_page_id(), PageId::UNBOUND);
    // Stays at the end
    assert!(!cursor.next().unwrap());
}

#[test]
fn test_start_past_end() {
    let (_cache, file, _) = create_file(8, 4);

    let mut cursor = file.io(PageId::new(4), PinFlags::new()).unwrap();
    assert!(!cursor.next().unwrap());
    assert_eq!(cursor.current_page_id(), PageId::UNBOUND);

    let mut cursor = file.io(PageId::UNBOUND, PinFlags::new()).unwrap();
    assert!(!cursor.next().unwrap());
}

#[test]
fn test_empty_file_has_no_pages() {
    let (_cache, file, _) = create_file(8, 0);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(!cursor.next().unwrap());
}

#[test]
fn test_next_to_jumps() {
    let (_cache, file, _) = create_file(8, 6);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();

    assert!(cursor.next_to(PageId::new(4)).unwrap());
    assert_eq!(cursor.get_byte_at(0), 4);
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.current_page_id(), PageId::new(5));
    assert!(cursor.next_to(PageId::new(1)).unwrap());
    assert_eq!(cursor.current_page_id(), PageId::new(1));
    assert!(!cursor.next_to(PageId::new(6)).unwrap());
}

/// A page grown by a write cursor is visible to readers.
#[test]
fn test_reader_sees_grown_page() {
    let (_cache, file, _) = create_file(8, 1);
    write_byte(&file, PageId::new(2), 0, 0xAB);

    let mut cursor = file.io(PageId::new(1), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_byte_at(0), 0);
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_byte_at(0), 0xAB);
    assert!(!cursor.next().unwrap());
}

// ============================================================================
// Retry protocol
// ============================================================================

#[test]
fn test_no_writer_no_retry() {
    let (cache, file, _) = create_file(8, 2);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());

    let _ = cursor.get_long_at(8);
    assert!(!cursor.should_retry().unwrap());
    assert_eq!(cache.stats().snapshot().retries, 0);
}

#[test]
fn test_write_cycle_forces_retry_then_settles() {
    let (cache, file, _) = create_file(8, 2);
    let mut cursor = file.io(PageId::new(1), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_byte_at(0), 1);
    cursor.set_offset(32);

    write_byte(&file, PageId::new(1), 0, 0x77);

    assert!(cursor.should_retry().unwrap());
    // Retry resets the per-read state
    assert_eq!(cursor.offset(), 0);
    assert_eq!(cursor.current_page_id(), PageId::new(1));

    assert_eq!(cursor.get_byte_at(0), 0x77);
    assert!(!cursor.should_retry().unwrap());
    assert_eq!(cache.stats().snapshot().retries, 1);
}

#[test]
fn test_should_retry_is_idempotent() {
    let (_cache, file, _) = create_file(8, 1);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());

    write_byte(&file, PageId::new(0), 0, 1);
    assert!(cursor.should_retry().unwrap());
    for _ in 0..5 {
        assert!(!cursor.should_retry().unwrap());
    }
}

#[test]
fn test_retry_clears_flags() {
    let (_cache, file, _) = create_file(8, 1);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());

    let _ = cursor.get_long_at(cursor_end());
    cursor.set_cursor_exception("bad record".to_string());
    write_byte(&file, PageId::new(0), 0, 1);

    assert!(cursor.should_retry().unwrap());
    assert!(!cursor.check_and_clear_bounds_flag());
    assert!(cursor.check_and_clear_cursor_exception().is_ok());
}

fn cursor_end() -> usize {
    cursorcache::PAGE_SIZE - 4
}

#[test]
fn test_cursor_exception_round_trip() {
    let (_cache, file, _) = create_file(8, 1);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());

    cursor.set_cursor_exception("torn record".to_string());
    match cursor.check_and_clear_cursor_exception() {
        Err(Error::CursorException(message)) => assert_eq!(message, "torn record"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(cursor.check_and_clear_cursor_exception().is_ok());
}

/// With a single frame, reading page 1 evicts page 0 from under the first
/// cursor, which must notice and fault page 0 back in.
#[test]
fn test_rebind_after_eviction() {
    let (cache, file, _) = create_file(1, 2);

    let mut first = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(first.next().unwrap());
    assert_eq!(first.get_byte_at(0), 0);

    let mut second = file.io(PageId::new(1), PinFlags::new()).unwrap();
    assert!(second.next().unwrap());
    assert_eq!(second.get_byte_at(0), 1);
    assert!(!second.should_retry().unwrap());
    assert_eq!(file.frame_of(PageId::new(0)), None);

    assert!(first.should_retry().unwrap());
    assert_eq!(first.current_page_id(), PageId::new(0));
    assert_eq!(first.get_byte_at(0), 0);
    assert!(!first.should_retry().unwrap());
    assert!(file.frame_of(PageId::new(0)).is_some());

    // And now the second cursor lost its frame
    assert!(second.should_retry().unwrap());
    assert_eq!(second.get_byte_at(0), 1);

    let stats = cache.stats().snapshot();
    assert!(stats.faults >= 3);
    assert!(stats.evictions >= 2);
}

// ============================================================================
// Mutation rejection
// ============================================================================

#[test]
fn test_read_cursor_rejects_every_mutation() {
    let (_cache, file, swapper) = create_file(8, 1);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());
    cursor.set_offset(8);

    let results = [
        cursor.put_byte(1),
        cursor.put_byte_at(0, 1),
        cursor.put_short(1),
        cursor.put_short_at(0, 1),
        cursor.put_int(1),
        cursor.put_int_at(0, 1),
        cursor.put_long(1),
        cursor.put_long_at(0, 1),
        cursor.put_bytes(&[1, 2, 3]),
        cursor.shift_bytes(0, 8, 8),
        cursor.zap_page(),
    ];
    for result in results {
        assert!(matches!(result, Err(Error::IllegalMutation)));
    }

    assert_eq!(cursor.offset(), 8);
    assert!(!cursor.check_and_clear_bounds_flag());
    assert_eq!(cursor.get_byte_at(0), 0);
    assert_eq!(cursor.get_long(), 0);
    assert!(!cursor.should_retry().unwrap());

    drop(cursor);
    file.flush().unwrap();
    assert_eq!(swapper.write_count(), 0);
}

// ============================================================================
// Fatal conditions
// ============================================================================

#[test]
fn test_unmapped_file_is_fatal() {
    let (_cache, file, _) = create_file(8, 3);
    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(cursor.next().unwrap());

    file.unmap().unwrap();

    // Unmap evicted the frame, so the stamp is stale and the retry path
    // checks the mapping
    assert!(cursor.should_retry().unwrap_err().is_unmapped());
    assert!(cursor.next().unwrap_err().is_unmapped());
}

#[test]
fn test_io_failure_propagates() {
    let (cache, file, swapper) = create_file(2, 3);
    swapper.set_fail_reads(true);

    let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(matches!(cursor.next(), Err(Error::Io(_))));
    assert_eq!(cache.free_frame_count(), 2);

    swapper.set_fail_reads(false);
    assert!(cursor.next_to(PageId::new(0)).unwrap());
    assert_eq!(cursor.get_byte_at(0), 0);
}

#[test]
fn test_io_failure_during_rebind() {
    let (_cache, file, swapper) = create_file(1, 2);
    let mut first = file.io(PageId::new(0), PinFlags::new()).unwrap();
    assert!(first.next().unwrap());

    let mut second = file.io(PageId::new(1), PinFlags::new()).unwrap();
    assert!(second.next().unwrap());

    swapper.set_fail_reads(true);
    assert!(matches!(first.should_retry(), Err(Error::Io(_))));
}

// ============================================================================
// Tracer
// ============================================================================

#[derive(Default)]
struct RecordingTracer {
    events: Mutex<Vec<String>>,
}

impl PageCursorTracer for RecordingTracer {
    fn begin_pin(&self, write_lock: bool, page_id: PageId, _swapper_id: SwapperId) {
        let kind = if write_lock { "write" } else { "read" };
        self.events.lock().push(format!("pin {kind} {}", page_id.0));
    }

    fn hit(&self, page_id: PageId, _swapper_id: SwapperId) {
        self.events.lock().push(format!("hit {}", page_id.0));
    }

    fn fault(&self, page_id: PageId, _swapper_id: SwapperId) {
        self.events.lock().push(format!("fault {}", page_id.0));
    }

    fn end_pin(&self, page_id: PageId, _swapper_id: SwapperId) {
        self.events.lock().push(format!("end {}", page_id.0));
    }

    fn unpin(&self, page_id: PageId, _swapper_id: SwapperId) {
        self.events.lock().push(format!("unpin {}", page_id.0));
    }
}

#[test]
fn test_tracer_sees_unpin_before_repin() {
    let tracer = Arc::new(RecordingTracer::default());
    let cache = PageCache::new(CacheConfig::new(4).with_tracer(tracer.clone()));
    let file = cache.map("traced", MemorySwapper::with_pages(2, |_, _| {}));

    let mut cursor = file
        .io(PageId::new(0), PinFlags::new().multi_versioned())
        .unwrap();
    assert!(cursor.next().unwrap());
    assert!(cursor.next().unwrap());
    assert_eq!(
        *tracer.events.lock(),
        vec!["pin read 0", "fault 0", "end 0", "unpin 0", "pin read 1", "fault 1", "end 1"]
    );
    tracer.events.lock().clear();

    // Writer on page 1, then a multi-versioned retry always re-pins
    {
        let mut writer = file.io_write(PageId::new(1), PinFlags::new()).unwrap();
        assert!(writer.next().unwrap());
    }
    tracer.events.lock().clear();

    assert!(cursor.should_retry().unwrap());
    assert_eq!(
        *tracer.events.lock(),
        vec!["unpin 1", "pin read 1", "hit 1", "end 1"]
    );
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Next,
    NextTo(u64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![3 => Just(Step::Next), 1 => (0u64..12).prop_map(Step::NextTo)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Advancing follows a simple model: bind the requested page if it is in
    /// range, otherwise report the end without moving `next`.
    #[test]
    fn advance_sequences_follow_model(
        pages in 0u64..8,
        frames in 1usize..4,
        start in 0u64..10,
        steps in proptest::collection::vec(step_strategy(), 1..40),
    ) {
        let (_cache, file, _) = create_file(frames, pages);
        let mut cursor = file.io(PageId::new(start), PinFlags::new()).unwrap();
        let mut model_next = start;

        for step in steps {
            let bound = match step {
                Step::Next => cursor.next().unwrap(),
                Step::NextTo(page) => {
                    model_next = page;
                    cursor.next_to(PageId::new(page)).unwrap()
                }
            };

            if model_next < pages {
                prop_assert!(bound);
                prop_assert_eq!(cursor.current_page_id(), PageId::new(model_next));
                let tag = loop {
                    let tag = cursor.get_byte_at(0);
                    if !cursor.should_retry().unwrap() {
                        break tag;
                    }
                };
                prop_assert_eq!(u64::from(tag), model_next);
                model_next += 1;
            } else {
                prop_assert!(!bound);
                prop_assert_eq!(cursor.current_page_id(), PageId::UNBOUND);
            }
        }
    }
}
