//! In-memory swapper, for tests and ephemeral files.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::swapper::{last_page_for_count, PageSwapper};

/// A swapper whose "disk" is a vector of pages.
///
/// Clones share the same storage, so a test can keep a handle after moving
/// the swapper into the cache and inspect what was written back.
///
/// # Example
/// ```
/// use cursorcache::storage::{MemorySwapper, PageSwapper};
/// use cursorcache::PageId;
///
/// let swapper = MemorySwapper::with_pages(3, |page_id, data| data[0] = page_id as u8);
/// assert_eq!(swapper.last_page_id(), Some(PageId::new(2)));
/// assert_eq!(swapper.byte_at(PageId::new(2), 0), Some(2));
/// ```
#[derive(Clone, Default)]
pub struct MemorySwapper {
    pages: Arc<Mutex<Vec<Page>>>,
    fail_reads: Arc<AtomicBool>,
    reads: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl MemorySwapper {
    /// An empty swapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// A swapper holding `count` pages, each initialized by `init`.
    pub fn with_pages(count: u64, mut init: impl FnMut(u64, &mut [u8])) -> Self {
        let swapper = Self::new();
        {
            let mut pages = swapper.pages.lock();
            for page_id in 0..count {
                let mut page = Page::new();
                init(page_id, page.as_mut_slice());
                pages.push(page);
            }
        }
        swapper
    }

    /// Make every subsequent `read` fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// One byte of a stored page, if the page exists.
    pub fn byte_at(&self, page_id: PageId, offset: usize) -> Option<u8> {
        let pages = self.pages.lock();
        let page = pages.get(usize::try_from(page_id.0).ok()?)?;
        page.as_slice().get(offset).copied()
    }

    /// Number of successful page loads.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of page write-backs.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl PageSwapper for MemorySwapper {
    fn read(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure").into());
        }

        let pages = self.pages.lock();
        match usize::try_from(page_id.0).ok().and_then(|i| pages.get(i)) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        drop(pages);

        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let index = usize::try_from(page_id.0)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "page id out of range"))?;

        let mut pages = self.pages.lock();
        while pages.len() <= index {
            pages.push(Page::new());
        }
        pages[index].copy_from(page);
        drop(pages);

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn last_page_id(&self) -> Option<PageId> {
        last_page_for_count(self.pages.lock().len() as u64)
    }

    fn force(&mut self) -> Result<()> {
        Ok(())
    }
}
