//! Storage layer - swappers and the page staging buffer.
//!
//! This module handles persistent storage:
//! - [`PageSwapper`] - The I/O seam the page cache faults through
//! - [`FileSwapper`] - Pages in a single file on disk
//! - [`MemorySwapper`] - Pages in memory
//! - [`page`] - The raw page buffer

mod file_swapper;
mod memory_swapper;
pub mod page;
mod swapper;

pub use file_swapper::FileSwapper;
pub use memory_swapper::MemorySwapper;
pub use swapper::PageSwapper;
pub(crate) use swapper::last_page_for_count;
