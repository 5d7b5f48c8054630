//! The frame directory: a `(file, page-id) -> frame-index` map whose
//! membership defines residency (invariant I5).

use std::collections::HashMap;

use crate::storage::file::{FileKey, PageId};

use super::frame::FrameId;

/// Pre-sizing factor: roughly 1.2 buckets per frame keeps the load factor
/// low without over-allocating for a pool that can never hold more than
/// one entry per frame.
const LOAD_FACTOR: f64 = 1.2;

/// Maps resident `(file, page-id)` pairs to the frame holding them.
pub struct Directory {
    map: HashMap<(FileKey, PageId), FrameId>,
}

impl Directory {
    /// Builds a directory pre-sized for a pool of `pool_size` frames.
    pub fn with_capacity_for(pool_size: usize) -> Self {
        let capacity = ((pool_size as f64 * LOAD_FACTOR) as usize) + 1;
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn lookup(&self, file: &FileKey, page_id: PageId) -> Option<FrameId> {
        self.map.get(&(file.clone(), page_id)).copied()
    }

    /// Registers `(file, page_id)` as resident in `frame`.
    ///
    /// Inserting a key that is already present violates I5 (the same page
    /// would appear to live in two frames); that is a programming error in
    /// the pool, not a condition callers can recover from, so it is asserted
    /// rather than returned as an error.
    pub fn insert(&mut self, file: FileKey, page_id: PageId, frame: FrameId) {
        let key = (file, page_id);
        debug_assert!(
            !self.map.contains_key(&key),
            "directory already has an entry for this (file, page_id) — I5 violated"
        );
        self.map.insert(key, frame);
    }

    /// Removes `(file, page_id)`. A miss is tolerated here: callers that
    /// reach `remove` via `disposePage`/`flushFile` have already confirmed
    /// residency, and `unpinPage`'s directory miss is handled before ever
    /// calling `remove`.
    pub fn remove(&mut self, file: &FileKey, page_id: PageId) -> Option<FrameId> {
        self.map.remove(&(file.clone(), page_id))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferPoolError;
    use crate::storage::file::{File, Page};
    use std::sync::Arc;

    struct Dummy(&'static str);
    impl File for Dummy {
        fn read_page(&self, page_id: PageId) -> Result<Page, BufferPoolError> {
            Ok(Page::zeroed(page_id))
        }
        fn write_page(&self, _page: &Page) -> Result<(), BufferPoolError> {
            Ok(())
        }
        fn allocate_page(&self) -> Result<Page, BufferPoolError> {
            Ok(Page::zeroed(0))
        }
        fn delete_page(&self, _page_id: PageId) -> Result<(), BufferPoolError> {
            Ok(())
        }
        fn filename(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn insert_then_lookup_then_remove() {
        let mut dir = Directory::with_capacity_for(8);
        let key = FileKey::new(Arc::new(Dummy("a.db")));

        dir.insert(key.clone(), 3, 1);
        assert_eq!(dir.lookup(&key, 3), Some(1));
        assert_eq!(dir.len(), 1);

        assert_eq!(dir.remove(&key, 3), Some(1));
        assert_eq!(dir.lookup(&key, 3), None);
        assert!(dir.is_empty());
    }

    #[test]
    fn distinct_files_with_same_page_id_are_distinct_keys() {
        let mut dir = Directory::with_capacity_for(8);
        let a = FileKey::new(Arc::new(Dummy("a.db")));
        let b = FileKey::new(Arc::new(Dummy("a.db"))); // same filename, distinct identity

        dir.insert(a.clone(), 0, 0);
        dir.insert(b.clone(), 0, 1);

        assert_eq!(dir.lookup(&a, 0), Some(0));
        assert_eq!(dir.lookup(&b, 0), Some(1));
    }

    #[test]
    fn remove_of_absent_key_is_a_no_op() {
        let mut dir = Directory::with_capacity_for(4);
        let key = FileKey::new(Arc::new(Dummy("a.db")));
        assert_eq!(dir.remove(&key, 0), None);
    }
}
