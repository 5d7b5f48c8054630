//! Per-frame metadata: the frame descriptor and the fixed-length table of
//! them the pool keeps one entry per physical frame in.

use crate::storage::file::{FileKey, PageId};

/// Identifies one slot in the pool's fixed frame array. Stable for the life
/// of the pool; only the *contents* of a frame (and its descriptor) change
/// as pages are admitted and evicted.
pub type FrameId = usize;

/// Bookkeeping for one frame: which page it holds (if any), how many
/// outstanding pins it has, and the two bits the clock sweep uses.
#[derive(Debug)]
pub struct FrameDescriptor {
    frame_index: FrameId,
    file: Option<FileKey>,
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
    valid: bool,
    ref_bit: bool,
}

impl FrameDescriptor {
    fn new(frame_index: FrameId) -> Self {
        Self {
            frame_index,
            file: None,
            page_id: None,
            pin_count: 0,
            dirty: false,
            valid: false,
            ref_bit: false,
        }
    }

    pub fn frame_index(&self) -> FrameId {
        self.frame_index
    }

    pub fn file(&self) -> Option<&FileKey> {
        self.file.as_ref()
    }

    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }

    pub fn set_ref_bit(&mut self, value: bool) {
        self.ref_bit = value;
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    /// Decrements the pin count. Returns `false` if it was already zero,
    /// mirroring `unpinPage`'s own check one level up (callers should check
    /// `pin_count() == 0` *before* calling this, as `unpinPage` does, to
    /// raise `PageNotPinned` with the context it needs; this is a backstop).
    pub fn unpin(&mut self) -> bool {
        if self.pin_count == 0 {
            return false;
        }
        self.pin_count -= 1;
        true
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Populates the descriptor for a newly admitted page: one pin, clean,
    /// marked used. `set` always starts a fresh admission at pin-count 1 —
    /// callers that hit the directory instead call `pin()` directly to add
    /// an additional pin to an already-resident page.
    pub fn set(&mut self, file: FileKey, page_id: PageId) {
        self.file = Some(file);
        self.page_id = Some(page_id);
        self.valid = true;
        self.pin_count = 1;
        self.dirty = false;
        self.ref_bit = true;
    }

    /// Resets to the invalid state (I4): no file, no pin, clean, ref-bit clear.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.ref_bit = false;
    }
}

/// The fixed-length array of per-frame descriptors backing a pool of N frames.
pub struct FrameTable {
    descriptors: Vec<FrameDescriptor>,
}

impl FrameTable {
    pub fn new(pool_size: usize) -> Self {
        Self {
            descriptors: (0..pool_size).map(FrameDescriptor::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, frame: FrameId) -> &FrameDescriptor {
        &self.descriptors[frame]
    }

    pub fn get_mut(&mut self, frame: FrameId) -> &mut FrameDescriptor {
        &mut self.descriptors[frame]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.descriptors.iter()
    }

    pub fn valid_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.is_valid()).count()
    }

    pub fn pinned_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.pin_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FileKey {
        use crate::error::BufferPoolError;
        use crate::storage::file::{File, Page};
        use std::sync::Arc;

        struct Dummy;
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
                "dummy"
            }
        }
        FileKey::new(Arc::new(Dummy))
    }

    #[test]
    fn fresh_descriptor_is_invalid() {
        let table = FrameTable::new(3);
        for d in table.iter() {
            assert!(!d.is_valid());
            assert_eq!(d.pin_count(), 0);
            assert!(!d.is_dirty());
            assert!(!d.ref_bit());
        }
    }

    #[test]
    fn set_then_clear_round_trips_to_invalid() {
        let mut table = FrameTable::new(1);
        table.get_mut(0).set(key(), 4);
        assert!(table.get(0).is_valid());
        assert_eq!(table.get(0).pin_count(), 1);
        assert!(table.get(0).ref_bit());

        table.get_mut(0).clear();
        assert!(!table.get(0).is_valid());
        assert_eq!(table.get(0).pin_count(), 0);
        assert!(!table.get(0).is_dirty());
        assert!(!table.get(0).ref_bit());
        assert!(table.get(0).file().is_none());
    }

    #[test]
    fn unpin_below_zero_is_rejected() {
        let mut d = FrameDescriptor::new(0);
        assert!(!d.unpin());
    }
}
