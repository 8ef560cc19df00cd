use super::{Allocator, RamBlock};
use crate::Addr;

/// Module RAM from the global allocator.
///
/// Each block's target address is its native address, so this allocator is
/// only available where native pointers fit an [`Addr`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(&mut self, size: usize) -> Option<RamBlock> {
        let block = RamBlock::try_zeroed(0, size)?;
        let base = block.as_ptr() as usize as Addr;
        Some(block.with_base(base))
    }

    fn release(&mut self, block: RamBlock) {
        drop(block);
    }
}
