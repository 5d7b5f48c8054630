//! The `Page` value type and the `File` trait the buffer pool reads from
//! and writes through. The pool only ever calls into them, never inspects
//! their internals beyond what these types expose.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::BufferPoolError;

/// Size in bytes of every page, resident or on disk.
pub const PAGE_SIZE: usize = 4096;

/// Identifies a page within a single file. Assigned by the file on
/// allocation, never by the buffer pool.
pub type PageId = u32;

/// Raw bytes of one page, fixed at [`PAGE_SIZE`].
pub type PageBuf = [u8; PAGE_SIZE];

/// An opaque, fixed-size page owned by the pool while it is resident.
#[derive(Clone)]
pub struct Page {
    page_id: PageId,
    data: PageBuf,
}

impl Page {
    pub fn new(page_id: PageId, data: PageBuf) -> Self {
        Self { page_id, data }
    }

    /// A freshly zeroed page with the given id, as returned by `allocate_page`.
    pub fn zeroed(page_id: PageId) -> Self {
        Self::new(page_id, [0u8; PAGE_SIZE])
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &PageBuf {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut PageBuf {
        &mut self.data
    }
}

/// The file abstraction the buffer pool mediates access to.
///
/// Implementors are identified by object identity, not by value: two
/// `Arc<dyn File>` pointing at distinct instances are distinct files to the
/// pool even if `filename()` happens to agree, and the pool never attempts
/// to compare files by anything other than pointer identity (see
/// [`FileKey`]). Cloning the trait object (as opposed to cloning the `Arc`)
/// would break that assumption and is therefore not supported.
pub trait File: Send + Sync {
    /// Reads the page with the given id from disk.
    fn read_page(&self, page_id: PageId) -> Result<Page, BufferPoolError>;

    /// Writes a page through to disk, regardless of any in-memory dirty flag.
    fn write_page(&self, page: &Page) -> Result<(), BufferPoolError>;

    /// Allocates a new page on disk and returns it with its id assigned.
    fn allocate_page(&self) -> Result<Page, BufferPoolError>;

    /// Deletes the page with the given id from disk.
    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError>;

    /// The name used to identify this file in error messages and logs.
    fn filename(&self) -> &str;
}

/// Identity-hashing handle used as half of the directory's key.
///
/// Wraps an `Arc<dyn File>` and compares/hashes by the `Arc`'s data pointer
/// rather than by any value the file exposes, since directory keys need a
/// stable, pointer-based notion of file identity.
#[derive(Clone)]
pub struct FileKey(Arc<dyn File>);

impl FileKey {
    pub fn new(file: Arc<dyn File>) -> Self {
        Self(file)
    }

    pub fn file(&self) -> &Arc<dyn File> {
        &self.0
    }

    pub fn filename(&self) -> &str {
        self.0.filename()
    }
}

impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for FileKey {}

impl Hash for FileKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileKey").field(&self.filename()).finish()
    }
}
