//! Page - the staging buffer between swappers and frames.
//!
//! Frames keep their bytes in atomic cells so optimistic readers can race
//! writers safely. Swappers want plain `&[u8]` for I/O, so every load and
//! write-back goes through a [`Page`].

use crate::common::config::PAGE_SIZE;

/// One page of plain bytes, aligned for direct I/O.
///
/// `Page` is only `Clone` under `cfg(test)`; production code copies
/// explicitly with [`copy_from`](Page::copy_from).
///
/// # Example
/// ```
/// use cursorcache::storage::page::Page;
///
/// let mut page = Page::filled(0x11);
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[..2], [0xFF, 0x11]);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// A zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self::filled(0)
    }

    /// A page with every byte set to `value`.
    pub fn filled(value: u8) -> Self {
        Self {
            data: [value; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero the page, as swappers do for pages past the end of storage.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut page = Page::new();
        page.copy_from(self);
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_layout() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut page = Page::filled(0xEE);
        page.reset();
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_from() {
        let mut source = Page::filled(0x5A);
        source.as_mut_slice()[PAGE_SIZE - 1] = 1;

        let mut target = Page::new();
        target.copy_from(&source);
        assert_eq!(target.as_slice()[0], 0x5A);
        assert_eq!(target.as_slice()[PAGE_SIZE - 1], 1);

        let cloned = target.clone();
        assert_eq!(cloned.as_slice(), target.as_slice());
    }
}
