pub mod free_list;
pub mod tag;

pub use free_list::{FreeListAllocator, PlacementPolicy};
pub use tag::MemoryTag;
