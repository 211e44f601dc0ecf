//! cursorcache - a page cache with optimistic, lock-free read cursors.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          cursorcache                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Cursors (cursor/)                       │   │
//! │  │   ReadCursor (optimistic) │ WriteCursor │ CursorChain    │   │
//! │  │        next → read → should_retry → (rebind)             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Page Cache (buffer/)                      │   │
//! │  │   PagedFile (page table, fault latch)                    │   │
//! │  │   PageCache (frames, free list, CLOCK) + PageLock        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Storage (storage/)                       │   │
//! │  │       PageSwapper: FileSwapper | MemorySwapper           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Frames, the seqlock word, and the page cache
//! - [`cursor`] - Read and write cursors
//! - [`storage`] - Swappers and the page staging buffer
//! - [`tracer`] - Pin/unpin observability hooks
//!
//! # Quick Start
//! ```no_run
//! use cursorcache::{CacheConfig, PageCache, PageCursor, PageId, PinFlags};
//!
//! let cache = PageCache::new(CacheConfig::default());
//! let file = cache.map_path("my_store.db").unwrap();
//!
//! {
//!     let mut writer = file.io_write(PageId::new(0), PinFlags::new()).unwrap();
//!     writer.next().unwrap();
//!     writer.put_long(42).unwrap();
//! }
//!
//! let mut reader = file.io(PageId::new(0), PinFlags::new()).unwrap();
//! reader.next().unwrap();
//! let value = loop {
//!     let value = reader.get_long_at(0);
//!     if !reader.should_retry().unwrap() {
//!         break value;
//!     }
//! };
//! assert_eq!(value, 42);
//! file.unmap().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod cursor;
pub mod storage;
pub mod tracer;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{CacheConfig, Error, FrameId, PageId, PinFlags, Result, SwapperId};

pub use buffer::{CacheStats, Frame, PageCache, PagedFile, StatsSnapshot};
pub use cursor::{ChainCursor, CursorChain, CursorSlot, PageCursor, ReadCursor, WriteCursor};
pub use tracer::{CountingTracer, LoggingTracer, NullTracer, PageCursorTracer, PinCounts, PinEvent};
