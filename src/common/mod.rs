//! Common types and utilities shared across cursorcache.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`CacheConfig`] / [`PinFlags`]
//! - Error types
//! - Identifiers (PageId, FrameId, SwapperId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;

pub use config::{CacheConfig, PinFlags};
pub use error::{Error, Result};
pub use frame_id::{FrameId, SwapperId};
pub use page_id::PageId;
