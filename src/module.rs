use crate::{
    Addr, LoadMode,
    format::{
        Layout, ModuleHeader, SymbolTable, WORD_SIZE, module_name, read_u32,
        symbol_table_bytes, write_u32,
    },
    os::{ForeignRam, RamBlock},
};
use delegate::delegate;

/// RAM backing a loaded module.
#[derive(Debug)]
pub(crate) enum Ram<'a> {
    /// Obtained from the loader's allocator; released on unload.
    Owned(RamBlock),
    /// Supplied by the caller; never released by the loader.
    Foreign(ForeignRam<'a>),
}

impl Ram<'_> {
    #[inline]
    pub(crate) fn base(&self) -> Addr {
        match self {
            Ram::Owned(block) => block.base(),
            Ram::Foreign(ram) => ram.base(),
        }
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Ram::Owned(block) => block.as_bytes(),
            Ram::Foreign(ram) => ram.as_bytes(),
        }
    }

    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Ram::Owned(block) => block.as_bytes_mut(),
            Ram::Foreign(ram) => ram.as_bytes_mut(),
        }
    }
}

/// A module that has been loaded and relocated.
///
/// Modules live inside a [`Loader`](crate::Loader) and are reached through a
/// [`ModuleHandle`](crate::ModuleHandle).
#[derive(Debug)]
pub struct Module<'a> {
    header: ModuleHeader,
    layout: Layout,
    ram: Option<Ram<'a>>,
    /// The source image, kept only when the mode still reads from it.
    image: Option<&'a [u8]>,
}

impl<'a> Module<'a> {
    pub(crate) fn new(
        header: ModuleHeader,
        layout: Layout,
        ram: Option<Ram<'a>>,
        image: Option<&'a [u8]>,
    ) -> Self {
        Self {
            header,
            layout,
            ram,
            image,
        }
    }

    pub(crate) fn into_ram(self) -> Option<Ram<'a>> {
        self.ram
    }

    delegate! {
        to self.layout {
            /// How the module was loaded.
            pub fn mode(&self) -> LoadMode;
            /// Base of the module's RAM block, which is also its Linkage Table base.
            /// `0` when the module needs no RAM.
            pub fn ram_base(&self) -> Addr;
            /// RAM the module occupies, as computed by [`required_ram_size`](crate::format::layout::required_ram_size).
            pub fn ram_size(&self) -> u32;
            /// Address of the first code byte.
            pub fn code_addr(&self) -> Addr;
            /// Address of the first `.data` byte.
            pub fn data_addr(&self) -> Addr;
            /// Address of the module header.
            pub fn header_addr(&self) -> Addr;
            /// Whether `pc` lies in the module's code.
            pub fn code_contains(&self, pc: Addr) -> bool;
        }
    }

    #[inline]
    pub fn header(&self) -> &ModuleHeader {
        &self.header
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Whether the module's RAM came from the loader's allocator.
    #[inline]
    pub fn owns_ram(&self) -> bool {
        matches!(self.ram, Some(Ram::Owned(_)))
    }

    /// The module's name, from symbol 0.
    pub fn name(&self) -> &str {
        module_name(&self.symbols()).unwrap_or("")
    }

    /// Header, relocations and symbol table: copied into RAM for `CopyAll`,
    /// in the source image otherwise.
    pub(crate) fn metadata(&self) -> &[u8] {
        let end = self.layout.code_offset() as usize;
        let metadata = match self.layout.header_ram_offset() {
            Some(offset) => self.ram_bytes().get(offset as usize..),
            None => self.image,
        };
        metadata.and_then(|bytes| bytes.get(..end)).unwrap_or(&[])
    }

    /// The module's symbol table.
    #[inline]
    pub fn symbols(&self) -> SymbolTable<'_> {
        SymbolTable::new(symbol_table_bytes(self.metadata(), &self.header))
    }

    /// The module's RAM: Linkage Table first, then whatever the mode copied.
    #[inline]
    pub fn ram_bytes(&self) -> &[u8] {
        self.ram.as_ref().map(Ram::bytes).unwrap_or(&[])
    }

    /// The Linkage Table entries.
    pub fn lot(&self) -> impl Iterator<Item = Addr> + '_ {
        let lot = self.ram_bytes().get(..self.layout.lot_size() as usize);
        lot.unwrap_or(&[])
            .chunks_exact(WORD_SIZE as usize)
            .filter_map(|word| read_u32(word, 0))
    }

    /// The code section, in RAM or in the source image.
    pub fn code(&self) -> &[u8] {
        let size = self.layout.code_size() as usize;
        let code = match self.layout.code_ram_offset() {
            Some(offset) => self.ram_bytes().get(offset as usize..),
            None => self
                .image
                .and_then(|image| image.get(self.layout.code_offset() as usize..)),
        };
        code.and_then(|bytes| bytes.get(..size)).unwrap_or(&[])
    }

    /// The code section, when it was copied into RAM.
    pub fn code_mut(&mut self) -> Option<&mut [u8]> {
        let offset = self.layout.code_ram_offset()? as usize;
        let size = self.layout.code_size() as usize;
        self.ram
            .as_mut()?
            .bytes_mut()
            .get_mut(offset..offset.checked_add(size)?)
    }

    /// Reads the word at target address `addr` from the module's RAM, or
    /// from its code when that executes in place.
    pub fn read_u32(&self, addr: Addr) -> Option<u32> {
        if let Some(offset) = addr.checked_sub(self.ram_base()) {
            if let Some(word) = read_u32(self.ram_bytes(), offset as usize) {
                return Some(word);
            }
        }
        if self.layout.code_ram_offset().is_none() {
            let offset = addr.checked_sub(self.code_addr())?;
            return read_u32(self.code(), offset as usize);
        }
        None
    }

    /// Writes the word at target address `addr` in the module's RAM.
    ///
    /// Returns `false` if the word does not lie in the module's RAM.
    pub fn write_u32(&mut self, addr: Addr, value: u32) -> bool {
        let base = self.ram_base();
        let Some(ram) = self.ram.as_mut() else {
            return false;
        };
        addr.checked_sub(base)
            .and_then(|offset| write_u32(ram.bytes_mut(), offset as usize, value))
            .is_some()
    }
}
