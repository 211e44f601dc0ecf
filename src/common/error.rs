//! Error types for cursorcache.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the page cache and its cursors.
///
/// Reaching the end of a file is *not* an error (`next()` returns
/// `Ok(false)`), and neither is a stale optimistic read (`should_retry()`
/// returns `Ok(true)`). Everything here is fatal to the call that raised it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a swapper while loading or flushing a page.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The paged file was unmapped while a cursor was still using it.
    #[error("File {file} has been unmapped")]
    FileUnmapped {
        /// Name the file was mapped under.
        file: String,
    },

    /// A mutating operation was invoked on a read cursor.
    #[error("Cannot write to read-locked page")]
    IllegalMutation,

    /// Every frame is either write locked or busy faulting, so nothing can
    /// be evicted.
    #[error("No free frames available in page cache")]
    NoFreeFrames,

    /// A swapper was asked for a page it cannot produce.
    #[error("Page {0} not found")]
    PageNotFound(u64),

    /// The page lies past the last byte a file can address.
    #[error("Page {0} is beyond the addressable range")]
    PageOutOfRange(u64),

    /// A decoding error raised by client code through the cursor.
    #[error("Cursor exception: {0}")]
    CursorException(String),
}

impl Error {
    /// Whether this error means the backing file is gone.
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Error::FileUnmapped { .. })
    }
}
