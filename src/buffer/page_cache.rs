//! Page cache - the fixed frame pool shared by every mapped file.
//!
//! The [`PageCache`] provides:
//! - A fixed pool of frames allocated at startup
//! - Mapping of files (each backed by a [`PageSwapper`]) into the pool
//! - Frame allocation: free list first, then CLOCK eviction
//! - Write-back of dirty pages on eviction

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::buffer::paged_file::{FileInner, PagedFile};
use crate::buffer::replacer::ClockReplacer;
use crate::buffer::{CacheStats, Frame};
use crate::common::{CacheConfig, Error, FrameId, Result, SwapperId};
use crate::storage::{FileSwapper, PageSwapper};

/// A pool of frames caching pages from any number of mapped files.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                        PageCache                            │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │    files     │  │        frames: Vec<Frame>         │   │
/// │  │ Swapper → F  │  │  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────┬───────┘  └───────────────────────────────────┘   │
/// │         │          ┌──────────────┐  ┌──────────────┐      │
/// │         ▼          │  free_list   │  │   replacer   │      │
/// │   PagedFile(s)     │ Vec<FrameId> │  │ ClockReplacer│      │
/// │   page → frame     └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `frames`: no lock (fixed size, each Frame is all atomics)
/// - `free_list`: `Mutex` (always modified)
/// - `files`: `RwLock` (read on every eviction, written on map/unmap)
/// - `stats`: no lock (atomic counters)
///
/// `PageCache` is a cheap handle; clones share the same pool.
///
/// # Usage
/// ```
/// use cursorcache::{CacheConfig, PageCache, PageCursor, PageId, PinFlags};
/// use cursorcache::storage::MemorySwapper;
///
/// let cache = PageCache::new(CacheConfig::new(8));
/// let file = cache.map("nodes", MemorySwapper::with_pages(2, |id, data| data[0] = id as u8));
///
/// let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
/// while cursor.next().unwrap() {
///     let value = loop {
///         let value = cursor.get_byte_at(0);
///         if !cursor.should_retry().unwrap() {
///             break value;
///         }
///     };
///     assert_eq!(u64::from(value), cursor.current_page_id().0);
/// }
/// ```
#[derive(Clone)]
pub struct PageCache {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Stack of never-used or released frame IDs.
    free_list: Mutex<Vec<FrameId>>,

    /// Victim selection once the free list runs dry.
    replacer: ClockReplacer,

    /// Mapped files by swapper id, for write-back during eviction.
    files: RwLock<HashMap<SwapperId, Weak<FileInner>>>,

    /// Next swapper id to hand out (0 is reserved for "unbound").
    next_swapper_id: AtomicU32,

    /// Performance statistics.
    stats: CacheStats,

    config: CacheConfig,
}

impl PageCache {
    /// Create a new page cache.
    ///
    /// # Panics
    /// Panics if the configured frame count is 0.
    pub fn new(config: CacheConfig) -> Self {
        assert!(config.frame_count() > 0, "frame_count must be > 0");

        let frame_count = config.frame_count();
        let frames: Vec<Frame> = (0..frame_count).map(|_| Frame::new()).collect();

        // LIFO free list: frame 0 is handed out first
        let free_list: Vec<FrameId> = (0..frame_count).rev().map(FrameId::new).collect();

        debug!(
            target: "cursorcache::cache",
            event = "cache_created",
            frame_count,
            memory_bytes = config.memory_bytes()
        );

        Self {
            inner: Arc::new(CacheInner {
                frames,
                free_list: Mutex::new(free_list),
                replacer: ClockReplacer::new(),
                files: RwLock::new(HashMap::new()),
                next_swapper_id: AtomicU32::new(1),
                stats: CacheStats::new(),
                config,
            }),
        }
    }

    // ========================================================================
    // Public API: Mapping files
    // ========================================================================

    /// Map a file backed by `swapper` into the cache.
    pub fn map(&self, name: impl Into<String>, swapper: impl PageSwapper + 'static) -> PagedFile {
        let name = name.into();
        let swapper_id = SwapperId(self.inner.next_swapper_id.fetch_add(1, Ordering::Relaxed));

        let file = Arc::new(FileInner::new(
            Arc::clone(&self.inner),
            name,
            swapper_id,
            Box::new(swapper),
        ));
        self.inner
            .files
            .write()
            .insert(swapper_id, Arc::downgrade(&file));

        debug!(
            target: "cursorcache::cache",
            event = "file_mapped",
            file = file.name(),
            swapper_id = swapper_id.0,
            last_page_id = ?file.last_page_id()
        );

        PagedFile::from_inner(file)
    }

    /// Map a file on disk, creating it if it doesn't exist.
    ///
    /// # Errors
    /// I/O errors opening or creating the file.
    pub fn map_path<P: AsRef<Path>>(&self, path: P) -> Result<PagedFile> {
        let swapper = FileSwapper::open_or_create(path.as_ref())?;
        Ok(self.map(path.as_ref().display().to_string(), swapper))
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Flush every mapped file.
    ///
    /// # Errors
    /// The first I/O error from any swapper.
    pub fn flush_all(&self) -> Result<()> {
        let files: Vec<Arc<FileInner>> = self
            .inner
            .files
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        for file in files {
            PagedFile::from_inner(file).flush()?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get page cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Get the number of frames.
    pub fn frame_count(&self) -> usize {
        self.inner.frames.len()
    }

    /// Get the number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.inner.free_list.lock().len()
    }

    /// Get the number of mapped files.
    pub fn mapped_file_count(&self) -> usize {
        self.inner.files.read().len()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Direct frame access, for inspection.
    ///
    /// # Panics
    /// Panics if `frame_id` is out of range.
    pub fn frame(&self, frame_id: FrameId) -> &Frame {
        self.inner.frame(frame_id)
    }
}

impl CacheInner {
    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    #[inline]
    pub(crate) fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[inline]
    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn unregister(&self, swapper_id: SwapperId) {
        self.files.write().remove(&swapper_id);
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get an exclusively locked, unbound frame, evicting if necessary.
    pub(crate) fn grab_free_frame(&self) -> Result<FrameId> {
        loop {
            let candidate = self.free_list.lock().pop();
            let Some(frame_id) = candidate else {
                break;
            };
            // The clock sweep may have claimed a free-listed frame already;
            // whoever holds the exclusive lock owns it
            if self.frame(frame_id).lock().try_exclusive_lock() {
                self.evict_locked(frame_id)?;
                return Ok(frame_id);
            }
        }

        let frame_id = self.replacer.evict(&self.frames).ok_or(Error::NoFreeFrames)?;
        self.evict_locked(frame_id)?;
        Ok(frame_id)
    }

    /// Give an exclusively locked, unbound frame back to the free list.
    pub(crate) fn release_free_frame(&self, frame_id: FrameId) {
        self.frame(frame_id).lock().unlock_exclusive();
        self.free_list.lock().push(frame_id);
    }

    /// Detach whatever page an exclusively locked frame holds.
    ///
    /// Dirty content is written back through the owning file first. On error
    /// the frame keeps its page and its exclusive lock is released.
    fn evict_locked(&self, frame_id: FrameId) -> Result<()> {
        let frame = self.frame(frame_id);
        let Some((swapper_id, page_id)) = frame.binding() else {
            return Ok(());
        };

        let owner = self.files.read().get(&swapper_id).and_then(Weak::upgrade);
        match owner {
            Some(file) => {
                if frame.is_dirty() {
                    if let Err(err) = file.write_back(frame, page_id) {
                        frame.lock().unlock_exclusive();
                        warn!(
                            target: "cursorcache::cache",
                            event = "evict_flush_failed",
                            frame = frame_id.0,
                            page_id = page_id.0,
                            error = %err
                        );
                        return Err(err);
                    }
                }
                file.forget(page_id, frame_id);
            }
            None if frame.is_dirty() => {
                warn!(
                    target: "cursorcache::cache",
                    event = "evict_discard_dirty",
                    frame = frame_id.0,
                    swapper_id = swapper_id.0,
                    page_id = page_id.0
                );
            }
            None => {}
        }

        frame.unbind();
        self.stats.record_eviction();
        trace!(
            target: "cursorcache::cache",
            event = "evicted",
            frame = frame_id.0,
            swapper_id = swapper_id.0,
            page_id = page_id.0
        );
        Ok(())
    }
}
