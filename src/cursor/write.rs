//! Write cursor, holding a shared write lock on its page.
//!
//! Any number of write cursors may hold the same page; coordinating their
//! byte ranges is the caller's business. Holding the write lock keeps the
//! page resident and marks it dirty. Optimistic readers that overlap the
//! write cycle see it on their next validation.

use std::sync::Arc;

use super::base::{CursorCore, CursorState, LockMode};
use super::PageCursor;
use crate::buffer::{FileInner, Frame};
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FrameId, PageId, PinFlags, Result};

/// Shared write lock on the pinned frame.
#[derive(Debug, Default)]
pub(crate) struct SharedWrite;

impl LockMode for SharedWrite {
    const WRITE_LOCKED: bool = true;

    #[inline]
    fn try_lock_page(&mut self, frame: &Frame) -> bool {
        frame.lock().try_write_lock()
    }

    #[inline]
    fn unlock_page(&mut self, frame: &Frame) {
        frame.lock().unlock_write();
    }

    fn convert_page_fault_lock(&mut self, frame: &Frame) {
        frame.lock().unlock_exclusive_and_take_write_lock();
    }

    fn pin_cursor_to_page(&mut self, core: &mut CursorCore, frame_id: FrameId, frame: &Frame) {
        core.init(frame_id);
        if !core.flags.transient {
            frame.increment_usage();
        }
        frame.mark_dirty();
    }
}

/// Cursor that writes pages under a shared write lock.
///
/// Advancing past the end of the file grows it, unless the cursor was
/// opened with [`PinFlags::no_grow`].
pub struct WriteCursor {
    core: CursorCore,
    lock: SharedWrite,
}

impl WriteCursor {
    pub(crate) fn new(file: Arc<FileInner>, page_id: PageId, flags: PinFlags) -> Self {
        Self {
            core: CursorCore::new(file, page_id, flags),
            lock: SharedWrite,
        }
    }

    fn unpin_current_page(&mut self) {
        if let Some(frame) = self.core.frame() {
            self.lock.unlock_page(frame);
        }
        self.core.trace_unpin();
        self.core.clear_page_cursor_state();
    }
}

impl CursorState for WriteCursor {
    #[inline]
    fn core(&self) -> &CursorCore {
        &self.core
    }

    #[inline]
    fn core_mut(&mut self) -> &mut CursorCore {
        &mut self.core
    }

    #[inline]
    fn check_writable(&self) -> Result<()> {
        Ok(())
    }
}

impl PageCursor for WriteCursor {
    fn next(&mut self) -> Result<bool> {
        if self.core.closed {
            return Ok(false);
        }
        self.unpin_current_page();

        let last_page_id = self.core.file.assert_mapped_and_get_last_page_id()?;
        let next_page_id = self.core.next_page_id;
        if !next_page_id.is_bound() {
            self.core.current_page_id = PageId::UNBOUND;
            return Ok(false);
        }
        let beyond_end = last_page_id.map_or(true, |last| next_page_id > last);
        if beyond_end {
            if self.core.flags.no_grow {
                self.core.current_page_id = PageId::UNBOUND;
                return Ok(false);
            }
            if next_page_id.byte_offset(PAGE_SIZE).is_none() {
                self.core.current_page_id = PageId::UNBOUND;
                return Err(Error::PageOutOfRange(next_page_id.0));
            }
            self.core.file.increase_last_page_id(next_page_id);
        }

        self.core.current_page_id = next_page_id;
        self.core.next_page_id = next_page_id.next();

        let event = self.core.begin_pin(SharedWrite::WRITE_LOCKED, next_page_id);
        self.core.pin(&mut self.lock, &event, next_page_id)?;
        drop(event);
        self.core.verify_context()?;
        Ok(true)
    }

    /// Write cursors exclude other exclusive holders for as long as they are
    /// pinned, so their view is never torn.
    fn should_retry(&mut self) -> Result<bool> {
        Ok(false)
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

impl Drop for WriteCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WriteCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCursor")
            .field("file", &self.core.file.name())
            .field("current_page_id", &self.core.current_page_id)
            .field("next_page_id", &self.core.next_page_id)
            .field("pinned_frame", &self.core.pinned_frame)
            .field("offset", &self.core.offset)
            .finish()
    }
}
