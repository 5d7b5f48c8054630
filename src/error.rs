//! Typed failures raised by the buffer pool and the files it manages.
//!
//! Every failure mode is a variant of one `#[derive(thiserror::Error)]` enum;
//! callers match on `BufferPoolError` rather than juggling several distinct
//! error types.

use crate::buffer::frame::FrameId;
use crate::storage::file::PageId;

/// Everything that can go wrong talking to the buffer pool or the files it manages.
#[derive(Debug, thiserror::Error)]
pub enum BufferPoolError {
    /// `allocBuf` found every frame pinned; there is no victim to evict.
    #[error("buffer pool exhausted: all {pool_size} frames are pinned")]
    BufferExceeded { pool_size: usize },

    /// `unpinPage` was called on a page whose pin count was already zero.
    #[error(
        "page {page_id} of file '{filename}' (frame {frame_index}) is not pinned"
    )]
    PageNotPinned {
        filename: String,
        page_id: PageId,
        frame_index: FrameId,
    },

    /// `flushFile` found a frame belonging to the file still pinned.
    #[error(
        "page {page_id} of file '{filename}' (frame {frame_index}) is pinned and cannot be flushed"
    )]
    PagePinned {
        filename: String,
        page_id: PageId,
        frame_index: FrameId,
    },

    /// `flushFile` found a frame that claims to belong to the file but is not valid.
    #[error(
        "frame {frame_index} is owned by a file but not valid (dirty={dirty}, valid={valid}, ref_bit={ref_bit})"
    )]
    BadBuffer {
        frame_index: FrameId,
        dirty: bool,
        valid: bool,
        ref_bit: bool,
    },

    /// The file layer failed a read, write, allocate, or delete.
    #[error("I/O error on file '{filename}': {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}
