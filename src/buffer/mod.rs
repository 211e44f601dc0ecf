//! Page cache management.
//!
//! The page cache is the in-memory layer between cursors and swappers. It
//! manages a fixed array of frames, each holding one page of one mapped file.
//!
//! # Components
//! - [`PageCache`] - The frame array, free list, and replacer
//! - [`PagedFile`] - One mapped file and its translation table
//! - [`Frame`] - A slot in the cache holding page bytes + metadata
//! - [`PageLock`] - The per-frame seqlock word
//! - [`CacheStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod frame;
mod page_cache;
pub mod page_lock;
mod paged_file;
pub mod replacer;
mod stats;

pub use frame::Frame;
pub use page_cache::PageCache;
pub use page_lock::PageLock;
pub use paged_file::PagedFile;
pub use stats::{CacheStats, StatsSnapshot};

pub(crate) use paged_file::FileInner;
