//! Frame - a slot in the page cache.
//!
//! A [`Frame`] holds one page's bytes plus the metadata cursors and the
//! cache coordinate through:
//! - The lock word ([`PageLock`])
//! - Which (swapper, page) is loaded, if any
//! - A usage counter for the clock sweep
//! - Dirty flag for write-back tracking

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::buffer::page_lock::PageLock;
use crate::common::config::{MAX_USAGE_COUNT, PAGE_SIZE};
use crate::common::{PageId, SwapperId};
use crate::storage::page::Page;

/// A frame in the page cache.
///
/// Frames are the "slots" of the cache. The cache allocates a fixed number
/// of them at startup and never frees them.
///
/// # Thread Safety
/// Every field is atomic, so a frame is shared freely between threads:
/// - `lock`: seqlock-style word guarding the binding and the bytes
/// - `swapper_id` / `file_page_id`: written only under the exclusive lock
/// - `usage`: best-effort counter, relaxed
/// - `dirty`: relaxed flag
/// - `data`: relaxed atomic bytes, so an optimistic reader racing a writer
///   sees torn content (caught by validation) rather than undefined behavior
pub struct Frame {
    lock: PageLock,
    swapper_id: AtomicU32,
    file_page_id: AtomicU64,
    usage: AtomicU8,
    dirty: AtomicBool,
    data: Box<[AtomicU8]>,
}

impl Frame {
    /// Create a new, unbound, zeroed frame.
    pub fn new() -> Self {
        Self {
            lock: PageLock::new(),
            swapper_id: AtomicU32::new(SwapperId::UNBOUND.0),
            file_page_id: AtomicU64::new(PageId::UNBOUND.0),
            usage: AtomicU8::new(0),
            dirty: AtomicBool::new(false),
            data: (0..PAGE_SIZE).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// The frame's lock word.
    #[inline]
    pub fn lock(&self) -> &PageLock {
        &self.lock
    }

    // ========================================================================
    // Identity binding
    // ========================================================================

    /// Whether this frame currently holds `page_id` of `swapper_id`.
    #[inline]
    pub fn is_bound_to(&self, swapper_id: SwapperId, page_id: PageId) -> bool {
        self.swapper_id.load(Ordering::Acquire) == swapper_id.0
            && self.file_page_id.load(Ordering::Acquire) == page_id.0
    }

    /// The (swapper, page) this frame holds, or `None` when unbound.
    pub fn binding(&self) -> Option<(SwapperId, PageId)> {
        let swapper_id = SwapperId(self.swapper_id.load(Ordering::Acquire));
        let page_id = PageId(self.file_page_id.load(Ordering::Acquire));
        swapper_id.is_bound().then_some((swapper_id, page_id))
    }

    /// Record which page this frame holds. Caller holds the exclusive lock.
    pub(crate) fn bind(&self, swapper_id: SwapperId, page_id: PageId) {
        debug_assert!(self.lock.is_exclusively_locked());
        self.file_page_id.store(page_id.0, Ordering::Release);
        self.swapper_id.store(swapper_id.0, Ordering::Release);
    }

    /// Forget the binding. Caller holds the exclusive lock.
    pub(crate) fn unbind(&self) {
        debug_assert!(self.lock.is_exclusively_locked());
        self.swapper_id.store(SwapperId::UNBOUND.0, Ordering::Release);
        self.file_page_id.store(PageId::UNBOUND.0, Ordering::Release);
        self.usage.store(0, Ordering::Relaxed);
        self.dirty.store(false, Ordering::Relaxed);
    }

    // ========================================================================
    // Usage counter (best effort)
    // ========================================================================

    /// Bump the usage counter, saturating at [`MAX_USAGE_COUNT`].
    #[inline]
    pub fn increment_usage(&self) {
        let usage = self.usage.load(Ordering::Relaxed);
        if usage < MAX_USAGE_COUNT {
            // Losing a race here only loses a hint
            let _ = self.usage.compare_exchange(
                usage,
                usage + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
    }

    /// Decrement the usage counter. Returns `true` if it was already zero,
    /// meaning the frame is an eviction candidate.
    #[inline]
    pub fn decrement_usage(&self) -> bool {
        self.usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |u| u.checked_sub(1))
            .is_err()
    }

    #[inline]
    pub fn usage(&self) -> u8 {
        self.usage.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Dirty flag
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Page bytes
    // ========================================================================

    /// Read one byte. `offset` must be below `PAGE_SIZE`.
    #[inline]
    pub fn get_byte(&self, offset: usize) -> u8 {
        self.data[offset].load(Ordering::Relaxed)
    }

    /// Write one byte. `offset` must be below `PAGE_SIZE`.
    #[inline]
    pub fn put_byte(&self, offset: usize, value: u8) {
        self.data[offset].store(value, Ordering::Relaxed);
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read_bytes(&self, offset: usize, buf: &mut [u8]) {
        let end = offset + buf.len();
        for (dst, src) in buf.iter_mut().zip(&self.data[offset..end]) {
            *dst = src.load(Ordering::Relaxed);
        }
    }

    /// Copy `buf` into the page starting at `offset`.
    pub fn write_bytes(&self, offset: usize, buf: &[u8]) {
        for (dst, &src) in self.data[offset..offset + buf.len()].iter().zip(buf) {
            dst.store(src, Ordering::Relaxed);
        }
    }

    /// Move `length` bytes from `source` to `source + shift`.
    ///
    /// Both ranges must lie inside the page; overlapping ranges are fine.
    pub fn shift_bytes(&self, source: usize, length: usize, shift: isize) {
        let mut moved = vec![0u8; length];
        self.read_bytes(source, &mut moved);
        let target = source.wrapping_add_signed(shift);
        self.write_bytes(target, &moved);
    }

    /// Zero the whole page.
    pub fn zero(&self) {
        for byte in self.data.iter() {
            byte.store(0, Ordering::Relaxed);
        }
    }

    /// Overwrite the frame with a freshly loaded page.
    pub(crate) fn load_from(&self, page: &Page) {
        self.write_bytes(0, page.as_slice());
    }

    /// Snapshot the frame into `page` for write-back.
    pub(crate) fn copy_to(&self, page: &mut Page) {
        self.read_bytes(0, page.as_mut_slice());
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new();
        assert_eq!(frame.binding(), None);
        assert!(!frame.is_dirty());
        assert_eq!(frame.usage(), 0);
        assert!(!frame.is_bound_to(SwapperId(1), PageId::new(0)));
    }

    #[test]
    fn test_frame_binding() {
        let frame = Frame::new();
        assert!(frame.lock().try_exclusive_lock());
        frame.bind(SwapperId(3), PageId::new(42));
        frame.lock().unlock_exclusive();

        assert!(frame.is_bound_to(SwapperId(3), PageId::new(42)));
        assert!(!frame.is_bound_to(SwapperId(4), PageId::new(42)));
        assert!(!frame.is_bound_to(SwapperId(3), PageId::new(41)));
        assert_eq!(frame.binding(), Some((SwapperId(3), PageId::new(42))));

        assert!(frame.lock().try_exclusive_lock());
        frame.unbind();
        frame.lock().unlock_exclusive();
        assert_eq!(frame.binding(), None);
    }

    #[test]
    fn test_frame_usage_saturates() {
        let frame = Frame::new();
        for _ in 0..10 {
            frame.increment_usage();
        }
        assert_eq!(frame.usage(), MAX_USAGE_COUNT);

        for _ in 0..MAX_USAGE_COUNT {
            assert!(!frame.decrement_usage());
        }
        assert!(frame.decrement_usage());
        assert_eq!(frame.usage(), 0);
    }

    #[test]
    fn test_frame_dirty_flag() {
        let frame = Frame::new();
        assert!(!frame.is_dirty());

        frame.mark_dirty();
        assert!(frame.is_dirty());

        frame.clear_dirty();
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_byte_access() {
        let frame = Frame::new();

        frame.put_byte(0, 0xAB);
        assert_eq!(frame.get_byte(0), 0xAB);

        frame.write_bytes(100, &[1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        frame.read_bytes(100, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_frame_shift_bytes() {
        let frame = Frame::new();
        frame.write_bytes(10, &[1, 2, 3, 4]);

        // Overlapping shift right
        frame.shift_bytes(10, 4, 2);
        let mut buf = [0u8; 6];
        frame.read_bytes(10, &mut buf);
        assert_eq!(buf, [1, 2, 1, 2, 3, 4]);

        // Shift left
        frame.shift_bytes(12, 4, -12);
        let mut buf = [0u8; 4];
        frame.read_bytes(0, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_frame_load_and_copy() {
        let frame = Frame::new();
        frame.load_from(&Page::filled(0x7F));
        assert_eq!(frame.get_byte(PAGE_SIZE - 1), 0x7F);

        let mut page = Page::new();
        frame.copy_to(&mut page);
        assert!(page.as_slice().iter().all(|&b| b == 0x7F));

        frame.zero();
        assert_eq!(frame.get_byte(17), 0);
    }

    #[test]
    fn test_unbind_resets_metadata() {
        let frame = Frame::new();
        frame.increment_usage();
        frame.mark_dirty();

        assert!(frame.lock().try_exclusive_lock());
        frame.bind(SwapperId(1), PageId::new(9));
        frame.unbind();
        frame.lock().unlock_exclusive();

        assert_eq!(frame.usage(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_concurrent_usage() {
        use std::sync::Arc;
        use std::thread;

        let frame = Arc::new(Frame::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let frame_clone = Arc::clone(&frame);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    frame_clone.increment_usage();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(frame.usage(), MAX_USAGE_COUNT);
    }
}
