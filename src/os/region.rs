use super::{Allocator, RamBlock};
use crate::{Addr, format::align_word};
use alloc::vec::Vec;

const ADDRESS_SPACE_END: u64 = u32::MAX as u64 + 1;

#[inline]
const fn align_up(addr: u64) -> u64 {
    (addr + 3) & !3
}

/// A first-fit allocator over a fixed window of the target address space.
///
/// Each block is backed by host memory but carries an address inside the
/// window, which is what relocations see. Useful for hosts that simulate a
/// target, and for tracking exactly how much RAM is outstanding.
#[derive(Debug)]
pub struct RegionAllocator {
    start: u64,
    end: u64,
    /// Live blocks as (base, size), sorted by base.
    live: Vec<(Addr, u32)>,
}

impl RegionAllocator {
    /// Manages the window `[start, start + len)`. Blocks are word aligned.
    ///
    /// The window is clamped to the end of the 32-bit address space.
    pub fn new(start: Addr, len: u32) -> Self {
        Self {
            start: align_up(start as u64),
            end: (start as u64 + len as u64).min(ADDRESS_SPACE_END),
            live: Vec::new(),
        }
    }

    /// Bytes currently handed out.
    pub fn in_use(&self) -> u32 {
        self.live.iter().map(|&(_, size)| size).sum()
    }

    /// Number of blocks currently handed out.
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Whether `addr` falls inside a live block.
    pub fn contains(&self, addr: Addr) -> bool {
        self.live
            .iter()
            .any(|&(base, size)| addr >= base && ((addr - base) as u64) < size as u64)
    }

    fn find_gap(&self, size: u32) -> Option<(usize, Addr)> {
        let mut cursor = self.start;
        for (index, &(base, len)) in self.live.iter().enumerate() {
            if (base as u64).saturating_sub(cursor) >= size as u64 {
                return Some((index, cursor as Addr));
            }
            cursor = align_up(base as u64 + len as u64);
        }
        (self.end.saturating_sub(cursor) >= size as u64).then_some((self.live.len(), cursor as Addr))
    }
}

impl Allocator for RegionAllocator {
    fn allocate(&mut self, size: usize) -> Option<RamBlock> {
        let size = align_word(u32::try_from(size).ok()?).max(4);
        let (index, base) = self.find_gap(size)?;
        let block = RamBlock::try_zeroed(base, size as usize)?;
        self.live.insert(index, (base, size));
        Some(block)
    }

    fn release(&mut self, block: RamBlock) {
        if let Ok(index) = self.live.binary_search_by_key(&block.base(), |&(base, _)| base) {
            self.live.remove(index);
        }
    }
}
