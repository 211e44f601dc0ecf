//! File page identifier type.

use std::fmt;

/// Identifies a page within one paged file.
///
/// Using `u64` so files are never limited by the id space; the top value is
/// reserved as the [`PageId::UNBOUND`] sentinel.
///
/// # Example
/// ```
/// use cursorcache::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_bound());
/// assert_eq!(page_id.0, 42);
/// assert_eq!(page_id.next(), PageId::new(43));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel for "cursor not positioned on any page".
    pub const UNBOUND: PageId = PageId(u64::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Check if this page ID is a real page (not the sentinel value).
    #[inline]
    pub fn is_bound(&self) -> bool {
        *self != Self::UNBOUND
    }

    /// The page after this one. `UNBOUND` stays `UNBOUND`.
    #[inline]
    pub fn next(&self) -> PageId {
        if self.is_bound() {
            PageId(self.0.saturating_add(1))
        } else {
            *self
        }
    }

    /// Byte offset of this page in a file of back-to-back pages.
    ///
    /// `None` when the page would end past `u64::MAX`.
    #[inline]
    pub fn byte_offset(&self, page_size: usize) -> Option<u64> {
        let start = self.0.checked_mul(page_size as u64)?;
        start.checked_add(page_size as u64)?;
        Some(start)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNBOUND {
            write!(f, "Page(UNBOUND)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
