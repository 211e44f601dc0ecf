//! Page buffer type.
//!
//! [`Page`] is the raw 4KB container swappers read into and write from.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
