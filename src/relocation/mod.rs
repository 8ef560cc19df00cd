//! Relocation table decoding and the relocation engine.
//!
//! Each relocation names a symbol of the module being loaded and a target
//! word. Targets below the Linkage Table size are LOT slots; the rest index
//! words of the module's data section.

mod engine;
mod traits;

pub(crate) use engine::{RelocationContext, relocate};
pub use traits::HostResolver;

use crate::format::{ModuleHeader, WORD_SIZE, layout, read_u32};

/// Encoded size of one relocation entry.
pub const RELOCATION_ENTRY_SIZE: u32 = 2 * WORD_SIZE;

/// One entry of the relocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelocationEntry {
    /// LOT slot, or LOT size plus a data word index.
    pub lot_offset: u32,
    /// Index into the module's own symbol table.
    pub symbol_index: u32,
}

/// Where a relocation writes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationTarget {
    /// A Linkage Table slot.
    Lot(u32),
    /// A word of the data section, by word index.
    Data(u32),
}

impl RelocationTarget {
    /// Byte offset of the target inside its section.
    #[inline]
    pub fn byte_offset(&self) -> Option<usize> {
        let (Self::Lot(word) | Self::Data(word)) = *self;
        (word as usize).checked_mul(WORD_SIZE as usize)
    }
}

impl RelocationEntry {
    /// Classifies the entry against a module with `lot_entries` LOT slots.
    #[inline]
    pub fn target(&self, lot_entries: u16) -> RelocationTarget {
        let lot_entries = lot_entries as u32;
        if self.lot_offset < lot_entries {
            RelocationTarget::Lot(self.lot_offset)
        } else {
            RelocationTarget::Data(self.lot_offset - lot_entries)
        }
    }
}

/// Iterator over the relocation table that follows a module header.
#[derive(Debug, Clone)]
pub struct Relocations<'m> {
    entries: core::slice::ChunksExact<'m, u8>,
}

impl<'m> Relocations<'m> {
    /// Reads the table from metadata starting at the module header.
    pub fn new(metadata: &'m [u8], header: &ModuleHeader) -> Self {
        let start = layout::relocations_offset() as usize;
        let end = start + layout::relocations_size(header) as usize;
        let table = metadata.get(start..end).unwrap_or(&[]);
        Self {
            entries: table.chunks_exact(RELOCATION_ENTRY_SIZE as usize),
        }
    }
}

impl Iterator for Relocations<'_> {
    type Item = RelocationEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(RelocationEntry {
            lot_offset: read_u32(entry, 0)?,
            symbol_index: read_u32(entry, 4)?,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Relocations<'_> {}
