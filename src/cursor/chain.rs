//! Linked read cursors that are validated and retried together.
//!
//! A chain owns its cursors in an arena and links them by index. There are
//! two kinds of link:
//!
//! - [`open_linked`](CursorChain::open_linked) follows a reference to another
//!   page of the same file. Every member is validated on retry.
//! - [`open_version`](CursorChain::open_version) follows a multi-versioned
//!   page to an older, immutable version of itself. Only chain heads are
//!   validated; continuations cannot be torn by writers, but they are still
//!   rebound whenever the head has to retry.
//!
//! In both cases a retry restarts every member that holds a frame, so the
//! whole chain is re-read from a consistent starting point.

use std::sync::Arc;

use super::base::{CursorCore, CursorState};
use super::read::{should_retry_linked, ReadCursor};
use super::PageCursor;
use crate::common::{Error, PageId, Result};

/// Position of a cursor inside a [`CursorChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorSlot(usize);

impl CursorSlot {
    /// The chain head.
    pub const HEAD: CursorSlot = CursorSlot(0);
}

/// Arena of read cursors with forward links.
///
/// ```
/// use cursorcache::{CacheConfig, CursorChain, CursorSlot, PageCache, PageCursor, PageId, PinFlags};
/// use cursorcache::storage::MemorySwapper;
///
/// let cache = PageCache::new(CacheConfig::new(4));
/// let file = cache.map("links", MemorySwapper::with_pages(3, |id, data| data[0] = id as u8 + 1));
///
/// let mut chain = CursorChain::new(file.io(PageId::new(0), PinFlags::new()).unwrap());
/// assert!(chain.head().next().unwrap());
///
/// let target = PageId::new(u64::from(chain.head().get_byte_at(0)));
/// let linked = chain.open_linked(CursorSlot::HEAD, target).unwrap();
/// assert!(chain.cursor(linked).next().unwrap());
/// assert_eq!(chain.cursor(linked).get_byte_at(0), 2);
///
/// assert!(!chain.should_retry().unwrap());
/// ```
pub struct CursorChain {
    cursors: Vec<ReadCursor>,
    links: Vec<Option<usize>>,
}

impl CursorChain {
    pub fn new(head: ReadCursor) -> Self {
        Self {
            cursors: vec![head],
            links: vec![None],
        }
    }

    pub fn head(&mut self) -> ChainCursor<'_> {
        self.cursor(CursorSlot::HEAD)
    }

    /// A handle on the cursor at `slot`. Its `should_retry` validates the
    /// members linked after it as well.
    ///
    /// # Panics
    /// Panics if `slot` does not belong to this chain.
    pub fn cursor(&mut self, slot: CursorSlot) -> ChainCursor<'_> {
        assert!(slot.0 < self.cursors.len(), "{slot:?} is not in this chain");
        ChainCursor { chain: self, slot }
    }

    /// The cursor linked after `slot`, if any.
    pub fn linked(&self, slot: CursorSlot) -> Option<CursorSlot> {
        self.links[slot.0].map(CursorSlot)
    }

    /// Number of cursors ever opened in this chain, the head included.
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// A chain always has its head.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Open a cursor on `page_id` of the same file, linked after `from`.
    ///
    /// Any cursors previously linked after `from` are closed. The new cursor
    /// is unbound; call `next()` on it to bind.
    ///
    /// # Errors
    /// `Error::FileUnmapped` if the file was unmapped.
    pub fn open_linked(&mut self, from: CursorSlot, page_id: PageId) -> Result<CursorSlot> {
        let source = &self.cursors[from.0];
        let file = Arc::clone(source.file());
        file.assert_mapped()?;
        let cursor = ReadCursor::new(file, page_id, source.flags());
        Ok(self.attach(from, cursor))
    }

    /// Open a continuation that reads an older version of the page `from`
    /// is bound to, stored at `page_id`.
    ///
    /// # Errors
    /// `Error::CursorException` unless `from` is multi-versioned and bound,
    /// `Error::FileUnmapped` if the file was unmapped.
    pub fn open_version(&mut self, from: CursorSlot, page_id: PageId) -> Result<CursorSlot> {
        let source = &self.cursors[from.0];
        if !source.flags().multi_versioned {
            return Err(Error::CursorException(
                "version chains need a multi-versioned cursor".to_string(),
            ));
        }
        if !source.is_bound() {
            return Err(Error::CursorException(
                "cannot follow versions from an unbound cursor".to_string(),
            ));
        }
        let previous = source.current_page_id();
        let file = Arc::clone(source.file());
        file.assert_mapped()?;

        let mut cursor = ReadCursor::new(file, page_id, source.flags());
        cursor.set_chain_previous(Some(previous));
        Ok(self.attach(from, cursor))
    }

    fn attach(&mut self, from: CursorSlot, cursor: ReadCursor) -> CursorSlot {
        match self.links[from.0] {
            Some(existing) => {
                self.close_from(existing);
                self.cursors[existing] = cursor;
                self.links[existing] = None;
                CursorSlot(existing)
            }
            None => {
                let slot = self.cursors.len();
                self.cursors.push(cursor);
                self.links.push(None);
                self.links[from.0] = Some(slot);
                CursorSlot(slot)
            }
        }
    }

    /// Validate the whole chain from the head.
    ///
    /// # Errors
    /// `Error::FileUnmapped`, or an I/O error while rebinding a member.
    pub fn should_retry(&mut self) -> Result<bool> {
        self.should_retry_from(CursorSlot::HEAD)
    }

    /// Validate the members from `slot` onward.
    pub fn should_retry_from(&mut self, slot: CursorSlot) -> Result<bool> {
        should_retry_linked(&mut self.cursors, &self.links, slot.0)
    }

    /// Close every cursor in the chain.
    pub fn close(&mut self) {
        for cursor in &mut self.cursors {
            cursor.close();
        }
    }

    fn close_from(&mut self, start: usize) {
        let mut index = Some(start);
        while let Some(i) = index {
            self.cursors[i].close();
            index = self.links[i];
        }
    }
}

/// A member of a [`CursorChain`], borrowed from it.
///
/// Reads and moves act on the member alone. [`should_retry`] walks the links
/// from this member, and a stale member restarts every cursor after it.
///
/// [`should_retry`]: PageCursor::should_retry
pub struct ChainCursor<'a> {
    chain: &'a mut CursorChain,
    slot: CursorSlot,
}

impl ChainCursor<'_> {
    pub fn slot(&self) -> CursorSlot {
        self.slot
    }

    pub fn is_bound(&self) -> bool {
        self.member().is_bound()
    }

    pub fn is_chain_head(&self) -> bool {
        self.member().is_chain_head()
    }

    fn member(&self) -> &ReadCursor {
        &self.chain.cursors[self.slot.0]
    }

    fn member_mut(&mut self) -> &mut ReadCursor {
        &mut self.chain.cursors[self.slot.0]
    }
}

impl CursorState for ChainCursor<'_> {
    fn core(&self) -> &CursorCore {
        self.member().core()
    }

    fn core_mut(&mut self) -> &mut CursorCore {
        self.member_mut().core_mut()
    }

    fn check_writable(&self) -> Result<()> {
        self.member().check_writable()
    }
}

impl PageCursor for ChainCursor<'_> {
    fn next(&mut self) -> Result<bool> {
        self.member_mut().next()
    }

    fn should_retry(&mut self) -> Result<bool> {
        self.chain.should_retry_from(self.slot)
    }

    fn close(&mut self) {
        self.member_mut().close();
    }
}

impl std::fmt::Debug for ChainCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainCursor")
            .field("slot", &self.slot)
            .field("cursor", self.member())
            .finish()
    }
}

impl std::fmt::Debug for CursorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorChain")
            .field("cursors", &self.cursors)
            .field("links", &self.links)
            .finish()
    }
}
