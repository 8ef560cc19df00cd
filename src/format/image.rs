use super::{LoadMode, ModuleHeader, SymbolTable, layout};
use crate::{Addr, Error, Result};

/// A module image as it sits in the target's memory.
///
/// `base` is where the image lives in the target address space (typically
/// flash) and `bytes` is a bounds-checked view of its contents.
#[derive(Debug, Clone, Copy)]
pub struct ModuleImage<'a> {
    base: Addr,
    bytes: &'a [u8],
}

impl<'a> ModuleImage<'a> {
    /// Creates an image located at `base` in the target address space.
    #[inline]
    pub const fn new(base: Addr, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    /// Creates an image whose target address is its own location in memory.
    ///
    /// Only available where native pointers fit an [`Addr`].
    #[cfg(target_pointer_width = "32")]
    #[inline]
    pub fn resident(bytes: &'a [u8]) -> Self {
        Self {
            base: bytes.as_ptr() as usize as Addr,
            bytes,
        }
    }

    #[inline]
    pub const fn base(&self) -> Addr {
        self.base
    }

    #[inline]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Parses the header at the start of the image.
    #[inline]
    pub fn header(&self) -> Result<ModuleHeader> {
        ModuleHeader::parse(self.bytes)
    }

    /// Checks that the image holds every section its header declares.
    pub fn validate(&self, header: &ModuleHeader) -> Result<()> {
        if (self.bytes.len() as u64) < layout::image_size(header) as u64 {
            return Err(Error::MalformedImage);
        }
        Ok(())
    }

    /// RAM the module needs when loaded in `mode`.
    pub fn required_ram_size(&self, mode: LoadMode) -> Result<u32> {
        Ok(layout::required_ram_size(&self.header()?, mode))
    }

    /// The symbol table of a validated image.
    #[inline]
    pub fn symbols(&self, header: &ModuleHeader) -> SymbolTable<'a> {
        SymbolTable::new(symbol_table_bytes(self.bytes, header))
    }

    /// The name stored in symbol 0.
    pub fn name(&self, header: &ModuleHeader) -> Result<&'a str> {
        module_name(&self.symbols(header))
    }
}

/// Slices the symbol table out of the metadata that starts at a module header.
#[inline]
pub(crate) fn symbol_table_bytes<'m>(metadata: &'m [u8], header: &ModuleHeader) -> &'m [u8] {
    let start = layout::symbol_table_offset(header) as usize;
    let end = start.saturating_add(header.symbol_table_size as usize);
    metadata.get(start..end).unwrap_or(&[])
}

/// Reads the module name from symbol 0.
pub(crate) fn module_name<'m>(symbols: &SymbolTable<'m>) -> Result<&'m str> {
    symbols
        .get(super::NAME_SYMBOL_INDEX)?
        .and_then(|symbol| symbol.name)
        .ok_or(Error::MalformedImage)
}
