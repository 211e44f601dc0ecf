//! Configuration for the page cache and its cursors.

use std::fmt;
use std::sync::Arc;

use crate::tracer::{NullTracer, PageCursorTracer};

/// Size of a page in bytes (4KB).
///
/// Every frame holds exactly one page, and swappers lay pages out
/// back-to-back: page N lives at byte offset `N × PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Ceiling for a frame's usage counter.
///
/// The clock sweep decrements the counter once per pass, so a frame touched
/// at least once survives up to this many sweeps before becoming a victim.
pub const MAX_USAGE_COUNT: u8 = 4;

/// Number of frames used when no explicit size is configured.
pub const DEFAULT_FRAME_COUNT: usize = 1024;

/// Settings for a [`PageCache`](crate::PageCache).
///
/// # Example
/// ```
/// use cursorcache::CacheConfig;
///
/// let config = CacheConfig::new(64);
/// assert_eq!(config.frame_count(), 64);
/// ```
#[derive(Clone)]
pub struct CacheConfig {
    frame_count: usize,
    tracer: Arc<dyn PageCursorTracer>,
}

impl CacheConfig {
    /// Config with `frame_count` frames and no tracing.
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            tracer: Arc::new(NullTracer),
        }
    }

    /// Replace the number of frames.
    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Install a tracer that every cursor opened through this cache reports to.
    pub fn with_tracer(mut self, tracer: Arc<dyn PageCursorTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Number of frames in the pool.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Tracer handed to new cursors.
    #[inline]
    pub fn tracer(&self) -> &Arc<dyn PageCursorTracer> {
        &self.tracer
    }

    /// Bytes of page memory this configuration allocates.
    pub fn memory_bytes(&self) -> usize {
        self.frame_count * PAGE_SIZE
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_COUNT)
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

/// Per-cursor options chosen when the cursor is opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PinFlags {
    /// Do not bump the frame usage counter on pin (one-off scans).
    pub transient: bool,
    /// Write cursors only: never extend the file past its last page.
    pub no_grow: bool,
    /// Validate and recover using version-chain semantics.
    pub multi_versioned: bool,
}

impl PinFlags {
    /// Default flags: usage tracked, file may grow, single version.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn no_grow(mut self) -> Self {
        self.no_grow = true;
        self
    }

    pub fn multi_versioned(mut self) -> Self {
        self.multi_versioned = true;
        self
    }
}
