//! RAM providers for loaded modules.

mod region;
mod traits;

pub use region::RegionAllocator;
pub use traits::{Allocator, ForeignRam, RamBlock};

cfg_if::cfg_if! {
    if #[cfg(all(feature = "heap", target_pointer_width = "32"))] {
        mod heap;
        pub use heap::HeapAllocator;
    }
}
