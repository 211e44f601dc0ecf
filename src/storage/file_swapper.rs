//! File swapper - page I/O against a single file on disk.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::swapper::{last_page_for_count, PageSwapper};

/// Swaps pages in and out of a single file.
///
/// # File Layout
/// Pages are laid out sequentially with no header:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Thread Safety
/// `FileSwapper` is **single-threaded**. The paged file owning it serializes
/// access through a mutex.
///
/// # Durability
/// Writes go to the OS; [`PageSwapper::force`] calls `fsync()`.
pub struct FileSwapper {
    file: File,
    path: PathBuf,
    /// Number of whole pages in the file.
    page_count: u64,
}

impl FileSwapper {
    /// Create a new, empty page file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count: 0,
        })
    }

    /// Open an existing page file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        // A trailing partial page is ignored
        let file_size = file.metadata()?.len();
        let page_count = file_size / PAGE_SIZE as u64;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count,
        })
    }

    /// Open an existing page file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.page_count * PAGE_SIZE as u64
    }
}

impl PageSwapper for FileSwapper {
    fn read(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = page_offset(page_id)?;
        if page_id.0 >= self.page_count {
            // Grown by a write cursor but never written back
            page.reset();
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = page_offset(page_id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;

        if page_id.0 >= self.page_count {
            self.page_count = page_id.0 + 1;
        }
        Ok(())
    }

    fn last_page_id(&self) -> Option<PageId> {
        last_page_for_count(self.page_count)
    }

    fn force(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

fn page_offset(page_id: PageId) -> Result<u64> {
    if !page_id.is_bound() {
        return Err(Error::PageNotFound(page_id.0));
    }
    page_id
        .byte_offset(PAGE_SIZE)
        .ok_or(Error::PageOutOfRange(page_id.0))
}
