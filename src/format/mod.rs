//! The module binary format.
//!
//! A module image is a flat, append-only sequence of native-endian words:
//!
//! ```text
//! +----------------+  offset 0
//! | ModuleHeader   |  24 bytes
//! +----------------+
//! | relocations    |  relocation_count * (lot_offset: u32, symbol_index: u32)
//! +----------------+
//! | symbol table   |  symbol_table_size bytes, padded to a word
//! +----------------+  code offset
//! | code           |  code_size bytes
//! +----------------+
//! | data           |  data_size bytes
//! +----------------+
//! ```
//!
//! Every offset is derived from the header alone; the image embeds no
//! pointers.

mod builder;
mod header;
mod image;
pub mod layout;
mod symbol;

pub use builder::ModuleBuilder;
pub use header::{MODULE_MAGIC, ModuleHeader};
pub use image::ModuleImage;
pub(crate) use image::{module_name, symbol_table_bytes};
pub use layout::{Layout, LoadMode};
pub use symbol::{
    INFO_SHIFT, NAME_OFFSET_MASK, NAME_SYMBOL_INDEX, SYMBOL_ENTRY_SIZE, Symbol, SymbolInfo,
    SymbolIter, SymbolKind, SymbolLocation, SymbolTable, pack, unpack,
};

/// Size of a word in the module format.
pub const WORD_SIZE: u32 = 4;

/// Reads a native-endian word at `offset`, or `None` if it does not fit.
#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(WORD_SIZE as usize)?;
    let word = bytes.get(offset..end)?;
    Some(u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
}

/// Writes a native-endian word at `offset`, or returns `None` if it does not fit.
#[inline]
pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let end = offset.checked_add(WORD_SIZE as usize)?;
    bytes.get_mut(offset..end)?.copy_from_slice(&value.to_ne_bytes());
    Some(())
}

/// Rounds `n` up to the next word boundary, saturating at the top of the range.
#[inline]
pub const fn align_word(n: u32) -> u32 {
    match n.checked_add(WORD_SIZE - 1) {
        Some(n) => n & !(WORD_SIZE - 1),
        None => u32::MAX & !(WORD_SIZE - 1),
    }
}
