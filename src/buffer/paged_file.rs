//! Paged file - one swapper-backed file mapped into the page cache.
//!
//! A [`PagedFile`] owns the translation table from file page ids to frames,
//! the fault latch that keeps two threads from loading the same page twice,
//! and the high-water mark cursors check on every advance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::buffer::page_cache::CacheInner;
use crate::buffer::Frame;
use crate::common::{Error, FrameId, PageId, PinFlags, Result, SwapperId};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::storage::page::Page;
use crate::storage::{last_page_for_count, PageSwapper};

/// Attempts at taking a frame's flush lock before a flush skips the page.
const FLUSH_LOCK_ATTEMPTS: usize = 64;

/// Handle to a file mapped into a [`PageCache`](crate::PageCache).
///
/// Clones share the same mapping. Cursors keep the mapping alive, but once
/// [`unmap`](PagedFile::unmap) has run every cursor operation that consults
/// the file fails with [`Error::FileUnmapped`].
#[derive(Clone)]
pub struct PagedFile {
    inner: Arc<FileInner>,
}

pub(crate) struct FileInner {
    cache: Arc<CacheInner>,
    name: String,
    swapper_id: SwapperId,

    /// Disk I/O; held only for the duration of one load, write, or force.
    swapper: Mutex<Box<dyn PageSwapper>>,

    /// Which frame holds which page of this file.
    table: RwLock<HashMap<PageId, FrameId>>,

    /// Serializes faults within this file.
    fault_latch: Mutex<()>,

    /// Number of pages, including pages grown by write cursors.
    page_count: AtomicU64,

    mapped: AtomicBool,
}

impl PagedFile {
    pub(crate) fn from_inner(inner: Arc<FileInner>) -> Self {
        Self { inner }
    }

    /// Open a read cursor whose first `next()` lands on `page_id`.
    ///
    /// # Errors
    /// `Error::FileUnmapped` if the file has been unmapped.
    pub fn io(&self, page_id: PageId, flags: PinFlags) -> Result<ReadCursor> {
        self.inner.assert_mapped()?;
        Ok(ReadCursor::new(Arc::clone(&self.inner), page_id, flags))
    }

    /// Open a write cursor whose first `next()` lands on `page_id`.
    ///
    /// # Errors
    /// `Error::FileUnmapped` if the file has been unmapped.
    pub fn io_write(&self, page_id: PageId, flags: PinFlags) -> Result<WriteCursor> {
        self.inner.assert_mapped()?;
        Ok(WriteCursor::new(Arc::clone(&self.inner), page_id, flags))
    }

    /// Name the file was mapped under.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn swapper_id(&self) -> SwapperId {
        self.inner.swapper_id
    }

    /// Highest valid page id, or `None` for an empty file.
    ///
    /// # Errors
    /// `Error::FileUnmapped` if the file has been unmapped.
    pub fn last_page_id(&self) -> Result<Option<PageId>> {
        self.inner.assert_mapped_and_get_last_page_id()
    }

    pub fn is_mapped(&self) -> bool {
        self.inner.mapped.load(Ordering::Acquire)
    }

    /// Number of this file's pages currently held in frames.
    pub fn resident_page_count(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Frame currently holding `page_id`, if resident.
    pub fn frame_of(&self, page_id: PageId) -> Option<FrameId> {
        self.inner.lookup(page_id)
    }

    /// Write every dirty, resident page back and force the swapper.
    ///
    /// Pages still write locked after a short wait are skipped and stay
    /// dirty; they are written on eviction or by a later flush.
    ///
    /// # Errors
    /// The first swapper I/O error. The failing page stays dirty.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Flush, then detach the file from the cache.
    ///
    /// Unmapping twice is a no-op.
    ///
    /// # Errors
    /// Swapper I/O errors while flushing.
    pub fn unmap(&self) -> Result<()> {
        self.inner.unmap()
    }
}

impl FileInner {
    pub(crate) fn new(
        cache: Arc<CacheInner>,
        name: String,
        swapper_id: SwapperId,
        swapper: Box<dyn PageSwapper>,
    ) -> Self {
        let page_count = swapper.last_page_id().map_or(0, |last| last.0 + 1);
        Self {
            cache,
            name,
            swapper_id,
            swapper: Mutex::new(swapper),
            table: RwLock::new(HashMap::new()),
            fault_latch: Mutex::new(()),
            page_count: AtomicU64::new(page_count),
            mapped: AtomicBool::new(true),
        }
    }

    #[inline]
    pub(crate) fn cache(&self) -> &CacheInner {
        &self.cache
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn swapper_id(&self) -> SwapperId {
        self.swapper_id
    }

    /// Last page id without the mapped check.
    pub(crate) fn last_page_id(&self) -> Option<PageId> {
        last_page_for_count(self.page_count.load(Ordering::Acquire))
    }

    pub(crate) fn assert_mapped(&self) -> Result<()> {
        if self.mapped.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::FileUnmapped {
                file: self.name.clone(),
            })
        }
    }

    pub(crate) fn assert_mapped_and_get_last_page_id(&self) -> Result<Option<PageId>> {
        self.assert_mapped()?;
        Ok(self.last_page_id())
    }

    /// Raise the high-water mark so that `page_id` is a valid page.
    pub(crate) fn increase_last_page_id(&self, page_id: PageId) {
        self.page_count.fetch_max(page_id.0 + 1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        self.table.read().get(&page_id).copied()
    }

    /// Drop the table entry for `page_id`, but only if it still points at
    /// `frame_id`.
    pub(crate) fn forget(&self, page_id: PageId, frame_id: FrameId) {
        let mut table = self.table.write();
        if table.get(&page_id) == Some(&frame_id) {
            table.remove(&page_id);
        }
    }

    // ========================================================================
    // Fault path
    // ========================================================================

    /// Load `page_id` into a frame.
    ///
    /// Returns `Ok(None)` if another thread faulted the page in while we
    /// waited for the latch. Otherwise the returned frame is bound to
    /// `page_id`, published in the table, and still exclusively locked: the
    /// caller's lock mode decides what to downgrade it to.
    pub(crate) fn fault(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let _latch = self.fault_latch.lock();
        self.assert_mapped()?;
        if self.lookup(page_id).is_some() {
            return Ok(None);
        }

        let frame_id = self.cache.grab_free_frame()?;
        let frame = self.cache.frame(frame_id);

        let mut page = Box::new(Page::new());
        if let Err(err) = self.swapper.lock().read(page_id, &mut page) {
            warn!(
                target: "cursorcache::fault",
                event = "page_load_failed",
                file = %self.name,
                page_id = page_id.0,
                error = %err
            );
            self.cache.release_free_frame(frame_id);
            return Err(err);
        }

        frame.load_from(&page);
        frame.bind(self.swapper_id, page_id);
        self.table.write().insert(page_id, frame_id);

        self.cache.stats().record_fault();
        Ok(Some(frame_id))
    }

    // ========================================================================
    // Write-back
    // ========================================================================

    /// Write a frame's bytes as `page_id`. Caller holds the exclusive or the
    /// flush lock, so no writer can be active.
    pub(crate) fn write_back(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let mut page = Box::new(Page::new());
        frame.copy_to(&mut page);
        frame.clear_dirty();

        if let Err(err) = self.swapper.lock().write(page_id, &page) {
            frame.mark_dirty();
            return Err(err);
        }
        self.cache.stats().record_write_back();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let entries: Vec<(PageId, FrameId)> = {
            let table = self.table.read();
            table.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        let mut written = 0usize;
        let mut skipped = 0usize;
        for (page_id, frame_id) in entries {
            let frame = self.cache.frame(frame_id);
            if !frame.is_dirty() {
                continue;
            }

            if !Self::acquire_flush_lock(frame) {
                skipped += 1;
                continue;
            }
            let result = if frame.is_bound_to(self.swapper_id, page_id) && frame.is_dirty() {
                written += 1;
                self.write_back(frame, page_id)
            } else {
                Ok(())
            };
            frame.lock().unlock_flush();
            result?;
        }

        self.swapper.lock().force()?;
        debug!(
            target: "cursorcache::flush",
            event = "file_flushed",
            file = %self.name,
            written,
            skipped
        );
        Ok(())
    }

    fn acquire_flush_lock(frame: &Frame) -> bool {
        for _ in 0..FLUSH_LOCK_ATTEMPTS {
            if frame.lock().try_flush_lock() {
                return true;
            }
            thread::yield_now();
        }
        false
    }

    // ========================================================================
    // Unmap
    // ========================================================================

    fn unmap(&self) -> Result<()> {
        if !self.mapped.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let flushed = self.flush();
        self.cache.unregister(self.swapper_id);

        // Hand back every frame we can lock; write-locked stragglers are
        // reclaimed by the clock sweep later
        let entries: Vec<(PageId, FrameId)> = {
            let table = self.table.read();
            table.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };
        let mut released = 0usize;
        for (page_id, frame_id) in entries {
            let frame = self.cache.frame(frame_id);
            if !frame.lock().try_exclusive_lock() {
                continue;
            }
            if !frame.is_bound_to(self.swapper_id, page_id) {
                frame.lock().unlock_exclusive();
                continue;
            }
            if frame.is_dirty() {
                if let Err(err) = self.write_back(frame, page_id) {
                    warn!(
                        target: "cursorcache::cache",
                        event = "unmap_flush_failed",
                        file = %self.name,
                        page_id = page_id.0,
                        error = %err
                    );
                }
            }
            self.forget(page_id, frame_id);
            frame.unbind();
            self.cache.release_free_frame(frame_id);
            released += 1;
        }

        debug!(
            target: "cursorcache::cache",
            event = "file_unmapped",
            file = %self.name,
            released
        );
        flushed
    }
}

impl Drop for FileInner {
    fn drop(&mut self) {
        if self.mapped.load(Ordering::Acquire) {
            if let Err(err) = self.unmap() {
                warn!(
                    target: "cursorcache::cache",
                    event = "implicit_unmap_failed",
                    file = %self.name,
                    error = %err
                );
            }
        }
    }
}
