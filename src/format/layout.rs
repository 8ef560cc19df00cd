//! Offsets and addresses of module sections.
//!
//! Everything here is a pure function of a [`ModuleHeader`], a [`LoadMode`]
//! and, for addresses, where the image and its RAM live. The loader and the
//! sizing query both go through these functions, so the RAM a load consumes
//! always equals [`required_ram_size`].
//!
//! RAM is laid out as the Linkage Table followed by whatever the mode copies:
//!
//! ```text
//! CopyAll:        [ LOT | header | relocs | symtab | code | data | bss ]
//! CopyCode:       [ LOT | code | data | bss ]
//! ExecuteInPlace: [ LOT | data | bss ]
//! ```

use super::{ModuleHeader, WORD_SIZE, align_word};
use crate::{Addr, Error};

/// How a module image is placed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadMode {
    /// Copy header, relocations, symbol table, code and data into RAM.
    CopyAll = 0,
    /// Copy code and data into RAM; metadata stays in the source image.
    CopyCode = 1,
    /// Copy only data into RAM; code executes from the source image.
    ExecuteInPlace = 2,
}

impl LoadMode {
    /// Every load mode, in raw-value order.
    pub const ALL: [LoadMode; 3] = [
        LoadMode::CopyAll,
        LoadMode::CopyCode,
        LoadMode::ExecuteInPlace,
    ];
}

impl TryFrom<u8> for LoadMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoadMode::CopyAll),
            1 => Ok(LoadMode::CopyCode),
            2 => Ok(LoadMode::ExecuteInPlace),
            _ => Err(Error::InvalidLoadMode),
        }
    }
}

/// Offset of the relocation table from the start of the image.
#[inline]
pub const fn relocations_offset() -> u32 {
    ModuleHeader::SIZE
}

/// Size of the relocation table in bytes.
#[inline]
pub const fn relocations_size(header: &ModuleHeader) -> u32 {
    header.relocation_count as u32 * 2 * WORD_SIZE
}

/// Offset of the symbol table from the start of the image.
#[inline]
pub const fn symbol_table_offset(header: &ModuleHeader) -> u32 {
    relocations_offset() + relocations_size(header)
}

/// Offset of the code section from the start of the image.
///
/// The code follows the header, the relocations and the word-padded symbol table.
#[inline]
pub const fn code_offset(header: &ModuleHeader) -> u32 {
    symbol_table_offset(header).saturating_add(align_word(header.symbol_table_size))
}

/// Number of bytes the image must provide: everything up to the end of `.data`.
#[inline]
pub const fn image_size(header: &ModuleHeader) -> u32 {
    code_offset(header)
        .saturating_add(header.code_size)
        .saturating_add(header.data_size)
}

/// Size of the Linkage Table in bytes.
#[inline]
pub const fn lot_size(header: &ModuleHeader) -> u32 {
    header.lot_entry_count as u32 * WORD_SIZE
}

/// RAM needed to load a module in the given mode.
///
/// The Linkage Table, `.data` and `.bss` always live in RAM. `CopyCode` adds
/// the code, and `CopyAll` adds the code plus everything that precedes it.
pub const fn required_ram_size(header: &ModuleHeader, mode: LoadMode) -> u32 {
    let base = lot_size(header)
        .saturating_add(header.data_size)
        .saturating_add(header.bss_size);
    match mode {
        LoadMode::CopyAll => base
            .saturating_add(code_offset(header))
            .saturating_add(header.code_size),
        LoadMode::CopyCode => base.saturating_add(header.code_size),
        LoadMode::ExecuteInPlace => base,
    }
}

/// Resolved placement of a loaded module.
///
/// Offsets are relative to the start of the module's RAM block; addresses
/// are in the target's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    mode: LoadMode,
    image_base: Addr,
    ram_base: Addr,
    lot_size: u32,
    code_offset: u32,
    code_size: u32,
    data_size: u32,
    bss_size: u32,
    ram_size: u32,
}

impl Layout {
    /// Computes the layout of a module whose image lives at `image_base`
    /// and whose RAM block starts at `ram_base`.
    pub const fn new(
        header: &ModuleHeader,
        mode: LoadMode,
        image_base: Addr,
        ram_base: Addr,
    ) -> Self {
        Self {
            mode,
            image_base,
            ram_base,
            lot_size: lot_size(header),
            code_offset: code_offset(header),
            code_size: header.code_size,
            data_size: header.data_size,
            bss_size: header.bss_size,
            ram_size: required_ram_size(header, mode),
        }
    }

    #[inline]
    pub const fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Start of the RAM block, which is also the Linkage Table base.
    #[inline]
    pub const fn ram_base(&self) -> Addr {
        self.ram_base
    }

    #[inline]
    pub const fn ram_size(&self) -> u32 {
        self.ram_size
    }

    #[inline]
    pub const fn lot_size(&self) -> u32 {
        self.lot_size
    }

    #[inline]
    pub const fn code_offset(&self) -> u32 {
        self.code_offset
    }

    #[inline]
    pub const fn code_size(&self) -> u32 {
        self.code_size
    }

    #[inline]
    pub const fn data_size(&self) -> u32 {
        self.data_size
    }

    #[inline]
    pub const fn bss_size(&self) -> u32 {
        self.bss_size
    }

    /// Offset of the header inside RAM, when the mode copies it.
    #[inline]
    pub const fn header_ram_offset(&self) -> Option<u32> {
        match self.mode {
            LoadMode::CopyAll => Some(self.lot_size),
            _ => None,
        }
    }

    /// Offset of the code inside RAM, when the mode copies it.
    #[inline]
    pub const fn code_ram_offset(&self) -> Option<u32> {
        match self.mode {
            LoadMode::CopyAll => Some(self.lot_size.saturating_add(self.code_offset)),
            LoadMode::CopyCode => Some(self.lot_size),
            LoadMode::ExecuteInPlace => None,
        }
    }

    /// Offset of `.data` inside RAM. `.bss` follows it directly.
    #[inline]
    pub const fn data_ram_offset(&self) -> u32 {
        match self.mode {
            LoadMode::CopyAll => self
                .lot_size
                .saturating_add(self.code_offset)
                .saturating_add(self.code_size),
            LoadMode::CopyCode => self.lot_size.saturating_add(self.code_size),
            LoadMode::ExecuteInPlace => self.lot_size,
        }
    }

    /// Address of the module header: in RAM for `CopyAll`, in the source image otherwise.
    #[inline]
    pub const fn header_addr(&self) -> Addr {
        match self.header_ram_offset() {
            Some(offset) => self.ram_base.wrapping_add(offset),
            None => self.image_base,
        }
    }

    /// Address of the first code byte.
    #[inline]
    pub const fn code_addr(&self) -> Addr {
        match self.code_ram_offset() {
            Some(offset) => self.ram_base.wrapping_add(offset),
            None => self.image_base.wrapping_add(self.code_offset),
        }
    }

    /// Address of the first `.data` byte.
    #[inline]
    pub const fn data_addr(&self) -> Addr {
        self.ram_base.wrapping_add(self.data_ram_offset())
    }

    /// Whether `pc` lies inside the code section.
    #[inline]
    pub const fn code_contains(&self, pc: Addr) -> bool {
        let start = self.code_addr();
        pc >= start && ((pc - start) as u64) < self.code_size as u64
    }
}
