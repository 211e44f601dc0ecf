//! Cache counters.
//!
//! The cache and its cursors record events through [`CacheStats`]; callers
//! read them back as a [`StatsSnapshot`]. Counters are relaxed atomics, so a
//! snapshot taken under load is a close estimate, not a consistent cut.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters shared by every file mapped in one [`PageCache`].
///
/// [`PageCache`]: crate::PageCache
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    faults: AtomicU64,
    evictions: AtomicU64,
    pages_written: AtomicU64,
    retries: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin found its page resident.
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A pin loaded its page through the swapper.
    #[inline]
    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_back(&self) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
    }

    /// A read cursor (or chain) failed validation and restarted.
    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let faults = self.faults.load(Ordering::Relaxed);
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            faults,
            evictions: self.evictions.load(Ordering::Relaxed),
            // Every successful fault reads exactly one page
            pages_read: faults,
            pages_written: self.pages_written.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
///
/// ```
/// use cursorcache::storage::MemorySwapper;
/// use cursorcache::{CacheConfig, PageCache, PageCursor, PageId, PinFlags};
///
/// let cache = PageCache::new(CacheConfig::new(4));
/// let file = cache.map("stats", MemorySwapper::with_pages(2, |_, _| {}));
///
/// let before = cache.stats().snapshot();
/// let mut cursor = file.io(PageId::new(0), PinFlags::new()).unwrap();
/// while cursor.next().unwrap() {}
/// let scan = cache.stats().snapshot().since(&before);
/// assert_eq!(scan.faults, 2);
/// assert_eq!(scan.hits, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub faults: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub retries: u64,
}

impl StatsSnapshot {
    /// Share of pins served without a fault, 0.0 when nothing was pinned.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.pins())
    }

    /// Retries per pin, 0.0 when nothing was pinned.
    pub fn retry_rate(&self) -> f64 {
        ratio(self.retries, self.pins())
    }

    pub fn pins(&self) -> u64 {
        self.hits + self.faults
    }

    /// Counts recorded between `earlier` and this snapshot.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.saturating_sub(earlier.hits),
            faults: self.faults.saturating_sub(earlier.faults),
            evictions: self.evictions.saturating_sub(earlier.evictions),
            pages_read: self.pages_read.saturating_sub(earlier.pages_read),
            pages_written: self.pages_written.saturating_sub(earlier.pages_written),
            retries: self.retries.saturating_sub(earlier.retries),
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pins={} (hit {:.1}%) evictions={} read={} written={} retries={}",
            self.pins(),
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.retries
        )
    }
}
