//! Symbol table codec.
//!
//! The symbol table starts with an entry count `N`, followed by `N` entries
//! of two words each: a packed word and a value. The top four bits of the
//! packed word hold [`SymbolInfo`]; the low 28 bits are the offset of the
//! symbol's NUL-terminated name, relative to the start of the table.

use super::{Layout, read_u32};
use crate::{Addr, Error, Result};
use bitflags::bitflags;
use core::ffi::CStr;

/// Shift of the info nibble inside a packed symbol word.
pub const INFO_SHIFT: u32 = 28;
/// Mask of the name offset inside a packed symbol word.
pub const NAME_OFFSET_MASK: u32 = 0x0FFF_FFFF;
/// Encoded size of one symbol table entry.
pub const SYMBOL_ENTRY_SIZE: u32 = 8;
/// Index of the symbol carrying the module's own name.
pub const NAME_SYMBOL_INDEX: u32 = 0;

bitflags! {
    /// The info nibble of a packed symbol word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SymbolInfo: u8 {
        /// Set when the symbol lives in the code section.
        const CODE = 0b100;
        /// Two-bit [`SymbolKind`] field.
        const TYPE = 0b011;
    }
}

/// Visibility of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SymbolKind {
    /// Module-private; carries no name.
    Local = 0,
    /// Visible to the host and to other modules.
    Exported = 1,
    /// Defined outside the module and resolved by the host at load time.
    Extern = 2,
    /// The module's own name. Always at index 0.
    Name = 3,
}

impl SymbolKind {
    #[inline]
    const fn from_bits(bits: u8) -> Self {
        match bits & SymbolInfo::TYPE.bits() {
            0 => SymbolKind::Local,
            1 => SymbolKind::Exported,
            2 => SymbolKind::Extern,
            _ => SymbolKind::Name,
        }
    }
}

/// Section a symbol's value is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolLocation {
    Code,
    Data,
}

/// A decoded symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol<'m> {
    /// `None` for local symbols.
    pub name: Option<&'m str>,
    /// Section-relative offset as stored, or an absolute address once rebased.
    pub value: Addr,
    pub kind: SymbolKind,
    pub location: SymbolLocation,
}

impl Symbol<'_> {
    /// Turns a section-relative value into an absolute address.
    ///
    /// Only `Local` and `Exported` symbols are rebased, against the code or
    /// data address depending on their location. `Extern` and `Name` symbols
    /// are returned unchanged.
    #[inline]
    pub fn rebase(mut self, layout: &Layout) -> Self {
        if matches!(self.kind, SymbolKind::Local | SymbolKind::Exported) {
            let base = match self.location {
                SymbolLocation::Code => layout.code_addr(),
                SymbolLocation::Data => layout.data_addr(),
            };
            self.value = self.value.wrapping_add(base);
        }
        self
    }
}

/// Packs a symbol's kind, location and name offset into one word.
#[inline]
pub const fn pack(kind: SymbolKind, location: SymbolLocation, name_offset: u32) -> u32 {
    let mut info = kind as u8;
    if let SymbolLocation::Code = location {
        info |= SymbolInfo::CODE.bits();
    }
    (info as u32) << INFO_SHIFT | (name_offset & NAME_OFFSET_MASK)
}

/// Splits a packed symbol word into kind, location and name offset.
#[inline]
pub const fn unpack(packed: u32) -> (SymbolKind, SymbolLocation, u32) {
    let info = (packed >> INFO_SHIFT) as u8;
    let location = if info & SymbolInfo::CODE.bits() != 0 {
        SymbolLocation::Code
    } else {
        SymbolLocation::Data
    };
    (SymbolKind::from_bits(info), location, packed & NAME_OFFSET_MASK)
}

/// A bounds-checked view of a module's symbol table.
#[derive(Debug, Clone, Copy)]
pub struct SymbolTable<'m> {
    bytes: &'m [u8],
}

impl<'m> SymbolTable<'m> {
    /// Wraps the raw bytes of a symbol table.
    #[inline]
    pub const fn new(bytes: &'m [u8]) -> Self {
        Self { bytes }
    }

    /// Number of entries, as declared by the table's first word.
    #[inline]
    pub fn len(&self) -> u32 {
        read_u32(self.bytes, 0).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the entry at `index`.
    ///
    /// Returns `Ok(None)` when `index` is past the declared entry count.
    ///
    /// # Errors
    /// [`Error::MalformedImage`] when the entry or its name lies outside the
    /// table, the name is not UTF-8, or entry 0 is not a `Name` symbol.
    pub fn get(&self, index: u32) -> Result<Option<Symbol<'m>>> {
        if index >= self.len() {
            return Ok(None);
        }
        let offset = (index as usize)
            .checked_mul(SYMBOL_ENTRY_SIZE as usize)
            .and_then(|offset| offset.checked_add(4))
            .ok_or(Error::MalformedImage)?;
        let packed = read_u32(self.bytes, offset).ok_or(Error::MalformedImage)?;
        let value = read_u32(self.bytes, offset + 4).ok_or(Error::MalformedImage)?;
        let (kind, location, name_offset) = unpack(packed);
        if index == NAME_SYMBOL_INDEX && kind != SymbolKind::Name {
            return Err(Error::MalformedImage);
        }
        let name = match kind {
            SymbolKind::Local => None,
            _ => Some(self.name_at(name_offset)?),
        };
        Ok(Some(Symbol {
            name,
            value,
            kind,
            location,
        }))
    }

    /// Iterates over the table in index order, stopping at the first entry
    /// that fails to decode.
    #[inline]
    pub fn iter(&self) -> SymbolIter<'m> {
        SymbolIter {
            table: *self,
            next: 0,
        }
    }

    fn name_at(&self, offset: u32) -> Result<&'m str> {
        let tail = self
            .bytes
            .get(offset as usize..)
            .ok_or(Error::MalformedImage)?;
        CStr::from_bytes_until_nul(tail)
            .map_err(|_| Error::MalformedImage)?
            .to_str()
            .map_err(|_| Error::MalformedImage)
    }
}

impl<'m> IntoIterator for &SymbolTable<'m> {
    type Item = Symbol<'m>;
    type IntoIter = SymbolIter<'m>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`SymbolTable`].
pub struct SymbolIter<'m> {
    table: SymbolTable<'m>,
    next: u32,
}

impl<'m> Iterator for SymbolIter<'m> {
    type Item = Symbol<'m>;

    fn next(&mut self) -> Option<Self::Item> {
        let symbol = self.table.get(self.next).ok().flatten()?;
        self.next += 1;
        Some(symbol)
    }
}
