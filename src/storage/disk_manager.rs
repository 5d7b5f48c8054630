//! A single-file, offset-addressed implementation of [`File`].
//!
//! A `Mutex`-guarded `std::fs::File`, pages addressed at `page_id *
//! PAGE_SIZE`, `seek` then `read`/`write`. No write-ahead log or recovery
//! bookkeeping — recovery is out of scope for this crate — and every I/O
//! failure becomes a propagated [`BufferPoolError::Io`] rather than a panic.
use std::collections::HashSet;
use std::fs::{File as FsFile, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::{debug, trace};

use crate::error::BufferPoolError;
use crate::storage::file::{File, Page, PageId, PAGE_SIZE};

/// Disk-backed [`File`] implementation storing every page of a database in
/// one flat file, addressed by `page_id * PAGE_SIZE`.
pub struct DiskManager {
    db_io: Mutex<FsFile>,
    filename: String,
    next_page_id: AtomicU32,
    /// Pages that have been deleted but whose slot has not been reused.
    /// Reading one of these is an error rather than silently returning
    /// stale or zeroed bytes.
    deleted: Mutex<HashSet<PageId>>,
}

impl DiskManager {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, BufferPoolError> {
        let path = path.as_ref();
        let filename = path.to_string_lossy().to_string();
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            })
            .map_err(|source| BufferPoolError::Io {
                filename: filename.clone(),
                source,
            })?;

        let len = db_io
            .metadata()
            .map_err(|source| BufferPoolError::Io {
                filename: filename.clone(),
                source,
            })?
            .len();
        let next_page_id = (len / PAGE_SIZE as u64) as u32;

        Ok(Self {
            db_io: Mutex::new(db_io),
            filename,
            next_page_id: AtomicU32::new(next_page_id),
            deleted: Mutex::new(HashSet::new()),
        })
    }

    fn io_err(&self, source: std::io::Error) -> BufferPoolError {
        BufferPoolError::Io {
            filename: self.filename.clone(),
            source,
        }
    }
}

impl File for DiskManager {
    fn read_page(&self, page_id: PageId) -> Result<Page, BufferPoolError> {
        if self.deleted.lock().unwrap().contains(&page_id) {
            return Err(self.io_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("page {page_id} was deleted"),
            )));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock().unwrap();
        let len = db_io.metadata().map_err(|e| self.io_err(e))?.len();
        let mut data = [0u8; PAGE_SIZE];
        if offset < len {
            db_io
                .seek(SeekFrom::Start(offset))
                .map_err(|e| self.io_err(e))?;
            let read = db_io.read(&mut data).map_err(|e| self.io_err(e))?;
            if read < PAGE_SIZE {
                trace!(page_id, read, "short read, zero-filling remainder");
            }
        }
        trace!(page_id, "read page from disk");
        Ok(Page::new(page_id, data))
    }

    fn write_page(&self, page: &Page) -> Result<(), BufferPoolError> {
        let offset = page.page_id() as u64 * PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock().unwrap();
        db_io
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_err(e))?;
        db_io.write_all(page.data()).map_err(|e| self.io_err(e))?;
        db_io.flush().map_err(|e| self.io_err(e))?;
        trace!(page_id = page.page_id(), "wrote page to disk");
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page, BufferPoolError> {
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        debug!(page_id, filename = %self.filename, "allocated page");
        Ok(Page::zeroed(page_id))
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.deleted.lock().unwrap().insert(page_id);
        debug!(page_id, filename = %self.filename, "deleted page");
        Ok(())
    }

    fn filename(&self) -> &str {
        &self.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn read_write_round_trip() {
        let dir = TempDir::new("clockbuf-disk-manager").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();

        let mut page = dm.allocate_page().unwrap();
        page.data_mut()[..5].copy_from_slice(b"hello");
        dm.write_page(&page).unwrap();

        let read_back = dm.read_page(page.page_id()).unwrap();
        assert_eq!(&read_back.data()[..5], b"hello");
    }

    #[test]
    fn read_past_end_returns_zeroed_page() {
        let dir = TempDir::new("clockbuf-disk-manager").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();

        let page = dm.read_page(7).unwrap();
        assert_eq!(page.data(), &[0u8; PAGE_SIZE]);
    }

    #[test]
    fn read_after_delete_errors() {
        let dir = TempDir::new("clockbuf-disk-manager").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = DiskManager::new(&db_file).unwrap();

        let page = dm.allocate_page().unwrap();
        dm.write_page(&page).unwrap();
        dm.delete_page(page.page_id()).unwrap();

        assert!(dm.read_page(page.page_id()).is_err());
    }

    #[test]
    fn reopening_resumes_page_id_allocation() {
        let dir = TempDir::new("clockbuf-disk-manager").unwrap();
        let db_file = dir.path().join("test.db");
        {
            let dm = DiskManager::new(&db_file).unwrap();
            for _ in 0..3 {
                let page = dm.allocate_page().unwrap();
                dm.write_page(&page).unwrap();
            }
        }
        let dm = DiskManager::new(&db_file).unwrap();
        let page = dm.allocate_page().unwrap();
        assert_eq!(page.page_id(), 3);
    }
}
