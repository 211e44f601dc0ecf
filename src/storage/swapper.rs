//! The swapper seam: how page bytes move between frames and storage.

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Disk I/O backend for one paged file.
///
/// The page cache owns each swapper behind a mutex and only calls it from a
/// fault (load), an eviction or flush (write back), or an explicit force, so
/// implementations can be single-threaded.
///
/// # Contract
/// - `read` of a page at or past the end of storage fills `page` with zeros
///   and succeeds; a cursor that grew the file may fault such a page before
///   it was ever written.
/// - `write` past the end extends storage.
/// - `last_page_id` reports the highest page that storage holds, or `None`
///   when it is empty.
pub trait PageSwapper: Send {
    /// Load page `page_id` into `page`.
    fn read(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Store `page` as page `page_id`.
    fn write(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Highest page id present in storage.
    fn last_page_id(&self) -> Option<PageId>;

    /// Make every previous `write` durable.
    fn force(&mut self) -> Result<()>;
}

impl<S: PageSwapper + ?Sized> PageSwapper for Box<S> {
    fn read(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        (**self).read(page_id, page)
    }

    fn write(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        (**self).write(page_id, page)
    }

    fn last_page_id(&self) -> Option<PageId> {
        (**self).last_page_id()
    }

    fn force(&mut self) -> Result<()> {
        (**self).force()
    }
}

/// Turn a page count into the id of the last page.
#[inline]
pub(crate) fn last_page_for_count(page_count: u64) -> Option<PageId> {
    page_count.checked_sub(1).map(PageId::new)
}
