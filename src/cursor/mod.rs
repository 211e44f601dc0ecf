//! Page cursors.
//!
//! A cursor walks the pages of one [`PagedFile`](crate::PagedFile), bound to
//! at most one frame at a time. Read cursors are optimistic and must check
//! [`PageCursor::should_retry`] after every read; write cursors hold a shared
//! write lock and never need to.
//!
//! # Components
//! - [`PageCursor`] - The cursor API shared by both kinds
//! - [`ReadCursor`] - Optimistic, lock-free reads
//! - [`WriteCursor`] - Writes under a shared write lock
//! - [`CursorChain`] - Linked read cursors validated as a unit
//!
//! All multi-byte values are little endian. Reads outside the page return
//! zero and writes outside the page are dropped; both raise the bounds flag,
//! which [`PageCursor::check_and_clear_bounds_flag`] reports.

mod base;
mod chain;
mod read;
mod write;

pub use chain::{ChainCursor, CursorChain, CursorSlot};
pub use read::ReadCursor;
pub use write::WriteCursor;

use crate::common::{PageId, Result};
use base::CursorState;

/// Operations common to read and write cursors.
///
/// Sealed: only this crate's cursors implement it.
pub trait PageCursor: CursorState {
    /// Move to the next page. `Ok(false)` once past the last page.
    ///
    /// # Errors
    /// `Error::FileUnmapped` if the file was unmapped, or a swapper I/O
    /// error from faulting the page in.
    fn next(&mut self) -> Result<bool>;

    /// Move to `page_id` instead of the following page.
    fn next_to(&mut self, page_id: PageId) -> Result<bool> {
        self.core_mut().next_page_id = page_id;
        self.next()
    }

    /// Whether everything read since the last `next` or retry may be
    /// inconsistent and has to be read again.
    ///
    /// # Errors
    /// `Error::FileUnmapped`, or an I/O error while rebinding an evicted page.
    fn should_retry(&mut self) -> Result<bool>;

    /// Release the current page. Subsequent `next` calls return `Ok(false)`.
    fn close(&mut self);

    fn current_page_id(&self) -> PageId {
        self.core().current_page_id
    }

    fn offset(&self) -> usize {
        self.core().offset
    }

    /// Move the cursor offset. Offsets past the page end reset it to 0 and
    /// raise the bounds flag.
    fn set_offset(&mut self, offset: usize) {
        self.core_mut().set_offset(offset);
    }

    fn check_and_clear_bounds_flag(&mut self) -> bool {
        self.core_mut().check_and_clear_bounds_flag()
    }

    /// Surface an error recorded with [`set_cursor_exception`], clearing it.
    ///
    /// [`set_cursor_exception`]: PageCursor::set_cursor_exception
    fn check_and_clear_cursor_exception(&mut self) -> Result<()> {
        self.core_mut().check_and_clear_cursor_exception()
    }

    /// Record an inconsistency found while reading. A retry clears it.
    fn set_cursor_exception(&mut self, message: String) {
        self.core_mut().cursor_exception = Some(message);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    fn get_byte(&mut self) -> u8 {
        self.core_mut().read_next::<1>()[0]
    }

    fn get_byte_at(&mut self, offset: usize) -> u8 {
        self.core_mut().read_at::<1>(offset)[0]
    }

    fn get_short(&mut self) -> i16 {
        i16::from_le_bytes(self.core_mut().read_next())
    }

    fn get_short_at(&mut self, offset: usize) -> i16 {
        i16::from_le_bytes(self.core_mut().read_at(offset))
    }

    fn get_int(&mut self) -> i32 {
        i32::from_le_bytes(self.core_mut().read_next())
    }

    fn get_int_at(&mut self, offset: usize) -> i32 {
        i32::from_le_bytes(self.core_mut().read_at(offset))
    }

    fn get_long(&mut self) -> i64 {
        i64::from_le_bytes(self.core_mut().read_next())
    }

    fn get_long_at(&mut self, offset: usize) -> i64 {
        i64::from_le_bytes(self.core_mut().read_at(offset))
    }

    /// Fill `buf` from the cursor offset.
    fn get_bytes(&mut self, buf: &mut [u8]) {
        self.core_mut().read_slice_next(buf);
    }

    // ========================================================================
    // Writes
    //
    // Every put fails with `Error::IllegalMutation` on a read cursor, before
    // touching the offset or the page.
    // ========================================================================

    fn put_byte(&mut self, value: u8) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_next(&[value]);
        Ok(())
    }

    fn put_byte_at(&mut self, offset: usize, value: u8) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_at(offset, &[value]);
        Ok(())
    }

    fn put_short(&mut self, value: i16) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_next(&value.to_le_bytes());
        Ok(())
    }

    fn put_short_at(&mut self, offset: usize, value: i16) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_at(offset, &value.to_le_bytes());
        Ok(())
    }

    fn put_int(&mut self, value: i32) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_next(&value.to_le_bytes());
        Ok(())
    }

    fn put_int_at(&mut self, offset: usize, value: i32) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_at(offset, &value.to_le_bytes());
        Ok(())
    }

    fn put_long(&mut self, value: i64) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_next(&value.to_le_bytes());
        Ok(())
    }

    fn put_long_at(&mut self, offset: usize, value: i64) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_at(offset, &value.to_le_bytes());
        Ok(())
    }

    fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.core_mut().write_next(data);
        Ok(())
    }

    /// Move `length` bytes at `source` by `shift` bytes within the page.
    fn shift_bytes(&mut self, source: usize, length: usize, shift: isize) -> Result<()> {
        self.check_writable()?;
        self.core_mut().shift_bytes(source, length, shift);
        Ok(())
    }

    /// Zero the whole page.
    fn zap_page(&mut self) -> Result<()> {
        self.check_writable()?;
        self.core_mut().zap_page();
        Ok(())
    }
}
