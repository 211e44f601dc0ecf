//! State and algorithms shared by every cursor kind.
//!
//! The bind/fault loop is written once, in [`CursorCore::pin`], and is
//! parameterized by a [`LockMode`]: the optimistic read mode and the shared
//! write mode differ only in how they lock a resident frame, how they turn
//! the exclusive lock left behind by a page fault into their own lock, and
//! what pinning does to the frame.

use std::sync::Arc;
use std::thread;

use crate::buffer::{FileInner, Frame};
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FrameId, PageId, PinFlags, Result};
use crate::tracer::{PageCursorTracer, PinEvent};

/// How a cursor locks the frames it binds to.
pub(crate) trait LockMode {
    /// Reported to the tracer when a pin begins.
    const WRITE_LOCKED: bool;

    /// Lock a resident frame. May fail, in which case the bind loop retries.
    fn try_lock_page(&mut self, frame: &Frame) -> bool;

    /// Undo a successful `try_lock_page` on a frame that turned out to hold
    /// some other page.
    fn unlock_page(&mut self, frame: &Frame);

    /// Turn the exclusive lock held after a page fault into this mode's lock.
    fn convert_page_fault_lock(&mut self, frame: &Frame);

    fn pin_cursor_to_page(&mut self, core: &mut CursorCore, frame_id: FrameId, frame: &Frame) {
        core.init(frame_id);
        if !core.flags.transient {
            frame.increment_usage();
        }
    }
}

/// Accessors the public cursor trait is built on.
///
/// Lives in a private module so that only this crate's cursors implement
/// [`PageCursor`](super::PageCursor).
pub trait CursorState {
    fn core(&self) -> &CursorCore;

    fn core_mut(&mut self) -> &mut CursorCore;

    /// Whether put operations are allowed on this cursor.
    fn check_writable(&self) -> Result<()>;
}

/// Fields common to read and write cursors.
pub struct CursorCore {
    pub(crate) file: Arc<FileInner>,
    pub(crate) tracer: Arc<dyn PageCursorTracer>,
    pub(crate) flags: PinFlags,
    pub(crate) current_page_id: PageId,
    pub(crate) next_page_id: PageId,
    pub(crate) pinned_frame: Option<FrameId>,
    pub(crate) offset: usize,
    pub(crate) out_of_bounds: bool,
    pub(crate) cursor_exception: Option<String>,
    pub(crate) closed: bool,
}

impl CursorCore {
    pub(crate) fn new(file: Arc<FileInner>, next_page_id: PageId, flags: PinFlags) -> Self {
        let tracer = Arc::clone(file.cache().config().tracer());
        Self {
            file,
            tracer,
            flags,
            current_page_id: PageId::UNBOUND,
            next_page_id,
            pinned_frame: None,
            offset: 0,
            out_of_bounds: false,
            cursor_exception: None,
            closed: false,
        }
    }

    #[inline]
    pub(crate) fn frame(&self) -> Option<&Frame> {
        self.pinned_frame.map(|id| self.file.cache().frame(id))
    }

    /// Point the cursor at a freshly pinned frame.
    pub(crate) fn init(&mut self, frame_id: FrameId) {
        self.pinned_frame = Some(frame_id);
        self.offset = 0;
    }

    /// Forget the pinned frame without touching its lock.
    pub(crate) fn clear_page_reference(&mut self) {
        self.pinned_frame = None;
    }

    /// Reset everything tied to the current page.
    pub(crate) fn clear_page_cursor_state(&mut self) {
        self.pinned_frame = None;
        self.offset = 0;
        self.out_of_bounds = false;
    }

    /// Report an unpin of the current page if a frame is held.
    pub(crate) fn trace_unpin(&self) {
        if self.pinned_frame.is_some() {
            self.tracer
                .unpin(self.current_page_id, self.file.swapper_id());
        }
    }

    pub(crate) fn begin_pin(&self, write_lock: bool, page_id: PageId) -> PinEvent {
        PinEvent::begin(&self.tracer, write_lock, page_id, self.file.swapper_id())
    }

    // ========================================================================
    // Bind / fault
    // ========================================================================

    /// Bind the cursor to `page_id`, faulting it in if needed.
    ///
    /// On return the cursor holds `lock`'s lock on a frame that was bound to
    /// `page_id` at lock time.
    pub(crate) fn pin<L: LockMode>(
        &mut self,
        lock: &mut L,
        event: &PinEvent,
        page_id: PageId,
    ) -> Result<()> {
        let file = Arc::clone(&self.file);
        let cache = file.cache();
        let swapper_id = file.swapper_id();

        loop {
            if let Some(frame_id) = file.lookup(page_id) {
                let frame = cache.frame(frame_id);
                if lock.try_lock_page(frame) {
                    if frame.is_bound_to(swapper_id, page_id) {
                        event.hit();
                        cache.stats().record_hit();
                        lock.pin_cursor_to_page(self, frame_id, frame);
                        return Ok(());
                    }
                    lock.unlock_page(frame);
                }
                thread::yield_now();
                continue;
            }

            if let Some(frame_id) = file.fault(page_id)? {
                let frame = cache.frame(frame_id);
                event.fault();
                lock.convert_page_fault_lock(frame);
                lock.pin_cursor_to_page(self, frame_id, frame);
                return Ok(());
            }
        }
    }

    /// Check that a bound cursor is addressable.
    pub(crate) fn verify_context(&self) -> Result<()> {
        if self.pinned_frame.is_none() {
            return Err(Error::CursorException(format!(
                "cursor on {} holds no frame",
                self.current_page_id
            )));
        }
        if self.offset > PAGE_SIZE {
            return Err(Error::CursorException(format!(
                "offset {} outside page of {PAGE_SIZE} bytes",
                self.offset
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Offset and flags
    // ========================================================================

    pub(crate) fn set_offset(&mut self, offset: usize) {
        if offset > PAGE_SIZE {
            self.offset = 0;
            self.out_of_bounds = true;
        } else {
            self.offset = offset;
        }
    }

    pub(crate) fn check_and_clear_bounds_flag(&mut self) -> bool {
        std::mem::take(&mut self.out_of_bounds)
    }

    pub(crate) fn check_and_clear_cursor_exception(&mut self) -> Result<()> {
        match self.cursor_exception.take() {
            Some(message) => Err(Error::CursorException(message)),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Byte access
    // ========================================================================

    /// Read `N` bytes at `offset`, or zeros with the bounds flag raised.
    pub(crate) fn read_at<const N: usize>(&mut self, offset: usize) -> [u8; N] {
        let mut buf = [0u8; N];
        if !self.read_into(offset, &mut buf) {
            self.out_of_bounds = true;
        }
        buf
    }

    /// Read `N` bytes at the cursor offset and advance past them.
    pub(crate) fn read_next<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        self.read_slice_next(&mut buf);
        buf
    }

    pub(crate) fn read_slice_next(&mut self, buf: &mut [u8]) {
        if self.read_into(self.offset, buf) {
            self.offset += buf.len();
        } else {
            buf.fill(0);
            self.out_of_bounds = true;
        }
    }

    fn read_into(&self, offset: usize, buf: &mut [u8]) -> bool {
        match self.frame() {
            Some(frame) if in_page(offset, buf.len()) => {
                frame.read_bytes(offset, buf);
                true
            }
            _ => false,
        }
    }

    /// Write `data` at `offset`, or drop it and raise the bounds flag.
    pub(crate) fn write_at(&mut self, offset: usize, data: &[u8]) {
        if !self.write_from(offset, data) {
            self.out_of_bounds = true;
        }
    }

    /// Write `data` at the cursor offset and advance past it.
    pub(crate) fn write_next(&mut self, data: &[u8]) {
        if self.write_from(self.offset, data) {
            self.offset += data.len();
        } else {
            self.out_of_bounds = true;
        }
    }

    fn write_from(&self, offset: usize, data: &[u8]) -> bool {
        match self.frame() {
            Some(frame) if in_page(offset, data.len()) => {
                frame.write_bytes(offset, data);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn shift_bytes(&mut self, source: usize, length: usize, shift: isize) {
        let in_range = source
            .checked_add_signed(shift)
            .is_some_and(|target| in_page(source, length) && in_page(target, length));
        match self.frame() {
            Some(frame) if in_range => frame.shift_bytes(source, length, shift),
            _ => self.out_of_bounds = true,
        }
    }

    pub(crate) fn zap_page(&mut self) {
        match self.frame() {
            Some(frame) => frame.zero(),
            None => self.out_of_bounds = true,
        }
    }
}

#[inline]
fn in_page(offset: usize, length: usize) -> bool {
    offset
        .checked_add(length)
        .is_some_and(|end| end <= PAGE_SIZE)
}
