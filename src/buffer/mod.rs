//! The buffer pool: frame directory, frame descriptor table, and the
//! manager that ties them together behind a clock replacement policy.

pub mod buffer_pool_manager;
pub mod directory;
pub mod frame;

pub use buffer_pool_manager::{BufferPoolManager, PagePin};
pub use frame::FrameId;
