//! Optimistic read cursor.
//!
//! A read cursor never locks the frames it reads. It samples the frame's
//! sequence when it binds, reads through relaxed atomics, and asks
//! [`should_retry`](PageCursor::should_retry) afterwards whether any write
//! or eviction overlapped. If so it rebinds in place and the caller re-reads.

use std::sync::Arc;

use tracing::trace;

use super::base::{CursorCore, CursorState, LockMode};
use super::PageCursor;
use crate::buffer::{FileInner, Frame};
use crate::common::{Error, PageId, PinFlags, Result};

/// Optimistic read lock: a stamp, nothing held.
#[derive(Debug, Default)]
pub(crate) struct OptimisticRead {
    stamp: u64,
}

impl LockMode for OptimisticRead {
    const WRITE_LOCKED: bool = false;

    #[inline]
    fn try_lock_page(&mut self, frame: &Frame) -> bool {
        self.stamp = frame.lock().try_optimistic_read_lock();
        true
    }

    #[inline]
    fn unlock_page(&mut self, _frame: &Frame) {}

    fn convert_page_fault_lock(&mut self, frame: &Frame) {
        self.stamp = frame.lock().unlock_exclusive();
    }
}

/// Cursor that reads pages without locking them.
///
/// Every read must be followed by [`should_retry`](PageCursor::should_retry)
/// before the data is trusted:
///
/// ```
/// use cursorcache::{CacheConfig, PageCache, PageCursor, PageId, PinFlags};
/// use cursorcache::storage::MemorySwapper;
///
/// let cache = PageCache::new(CacheConfig::new(4));
/// let file = cache.map("counters", MemorySwapper::with_pages(1, |_, data| data[..8].fill(1)));
///
/// let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
/// assert!(cursor.next().unwrap());
/// let value = loop {
///     let value = cursor.get_long();
///     cursor.set_offset(0);
///     if !cursor.should_retry().unwrap() {
///         break value;
///     }
/// };
/// assert_eq!(value, 0x0101_0101_0101_0101);
/// ```
pub struct ReadCursor {
    core: CursorCore,
    lock: OptimisticRead,
    /// `Some(page)` when this cursor reads an older version of `page`.
    chain_previous: Option<PageId>,
}

impl ReadCursor {
    pub(crate) fn new(file: Arc<FileInner>, page_id: PageId, flags: PinFlags) -> Self {
        Self {
            core: CursorCore::new(file, page_id, flags),
            lock: OptimisticRead::default(),
            chain_previous: None,
        }
    }

    pub(crate) fn file(&self) -> &Arc<FileInner> {
        &self.core.file
    }

    pub(crate) fn flags(&self) -> PinFlags {
        self.core.flags
    }

    pub(crate) fn set_chain_previous(&mut self, previous: Option<PageId>) {
        self.chain_previous = previous;
    }

    /// Whether this cursor is the head of a version chain.
    pub fn is_chain_head(&self) -> bool {
        self.chain_previous.is_none()
    }

    /// Whether the cursor currently holds a frame.
    pub fn is_bound(&self) -> bool {
        self.core.pinned_frame.is_some()
    }

    fn unpin_current_page(&mut self) {
        self.core.trace_unpin();
        self.lock.stamp = 0;
        self.core.clear_page_cursor_state();
    }

    fn pin_current_page(&mut self) -> Result<()> {
        let page_id = self.core.current_page_id;
        let event = self.core.begin_pin(OptimisticRead::WRITE_LOCKED, page_id);
        self.core.pin(&mut self.lock, &event, page_id)
    }

    /// Whether this cursor's view may have been torn.
    ///
    /// Continuations of a multi-versioned chain read immutable history and
    /// are never the trigger.
    fn is_invalid_version(&self, frame: &Frame) -> bool {
        if self.core.flags.multi_versioned && self.chain_previous.is_some() {
            return false;
        }
        !frame.lock().validate_read_lock(self.lock.stamp)
    }

    /// Reset per-read state and get a fresh stamp, rebinding if the frame
    /// was evicted or the cursor reads versioned data.
    fn start_retry(&mut self) -> Result<()> {
        let Some(frame) = self.core.frame() else {
            return Ok(());
        };
        let file = Arc::clone(&self.core.file);
        let page_id = self.core.current_page_id;

        self.lock.stamp = frame.lock().try_optimistic_read_lock();
        let still_bound = frame.is_bound_to(file.swapper_id(), page_id);

        self.core.set_offset(0);
        self.core.check_and_clear_bounds_flag();
        self.core.cursor_exception = None;

        if !still_bound || self.core.flags.multi_versioned {
            // Drop the frame first so a failed pin leaves nothing behind
            self.core.clear_page_reference();
            self.core.tracer.unpin(page_id, file.swapper_id());
            self.pin_current_page()?;
        }
        Ok(())
    }
}

/// Validate a run of linked cursors starting at `start`, and if any is
/// invalid, restart every frame-holding member.
///
/// `links[i]` is the index of the cursor after `cursors[i]`.
pub(crate) fn should_retry_linked(
    cursors: &mut [ReadCursor],
    links: &[Option<usize>],
    start: usize,
) -> Result<bool> {
    let mut invalid = None;
    let mut index = Some(start);
    while let Some(i) = index {
        let cursor = &cursors[i];
        if let Some(frame) = cursor.core.frame() {
            if cursor.is_invalid_version(frame) {
                invalid = Some((cursor.core.current_page_id, frame.lock().sequence()));
                break;
            }
        }
        index = links[i];
    }

    let Some((page_id, sequence)) = invalid else {
        return Ok(false);
    };

    let file = Arc::clone(&cursors[start].core.file);
    file.assert_mapped()?;
    file.cache().stats().record_retry();
    trace!(
        target: "cursorcache::retry",
        event = "optimistic_retry",
        file = %file.name(),
        page_id = page_id.0,
        sequence
    );

    let mut index = Some(start);
    while let Some(i) = index {
        cursors[i].start_retry()?;
        index = links[i];
    }
    Ok(true)
}

impl CursorState for ReadCursor {
    #[inline]
    fn core(&self) -> &CursorCore {
        &self.core
    }

    #[inline]
    fn core_mut(&mut self) -> &mut CursorCore {
        &mut self.core
    }

    fn check_writable(&self) -> Result<()> {
        Err(Error::IllegalMutation)
    }
}

impl PageCursor for ReadCursor {
    fn next(&mut self) -> Result<bool> {
        if self.core.closed {
            return Ok(false);
        }
        self.unpin_current_page();

        let last_page_id = self.core.file.assert_mapped_and_get_last_page_id()?;
        let next_page_id = self.core.next_page_id;
        match last_page_id {
            Some(last) if next_page_id.is_bound() && next_page_id <= last => {}
            _ => {
                self.core.current_page_id = PageId::UNBOUND;
                return Ok(false);
            }
        }

        self.core.current_page_id = next_page_id;
        self.core.next_page_id = next_page_id.next();
        self.pin_current_page()?;
        self.core.verify_context()?;
        Ok(true)
    }

    fn should_retry(&mut self) -> Result<bool> {
        should_retry_linked(std::slice::from_mut(self), &[None], 0)
    }

    fn close(&mut self) {
        if self.core.closed {
            return;
        }
        self.unpin_current_page();
        self.core.current_page_id = PageId::UNBOUND;
        self.core.closed = true;
    }
}

impl Drop for ReadCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ReadCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCursor")
            .field("file", &self.core.file.name())
            .field("current_page_id", &self.core.current_page_id)
            .field("next_page_id", &self.core.next_page_id)
            .field("pinned_frame", &self.core.pinned_frame)
            .field("offset", &self.core.offset)
            .field("chain_previous", &self.chain_previous)
            .finish()
    }
}
