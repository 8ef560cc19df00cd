//! Encoder for module images.
//!
//! The module toolchain normally produces images; this builder writes the
//! same format from Rust so hosts, tests and benchmarks can assemble modules
//! without it.

use super::{
    MODULE_MAGIC, ModuleHeader, SYMBOL_ENTRY_SIZE, SymbolKind, SymbolLocation, WORD_SIZE,
    align_word, layout, pack,
};
use crate::{Error, Result};
use alloc::{string::String, vec, vec::Vec};

struct PendingSymbol {
    kind: SymbolKind,
    location: SymbolLocation,
    name: Option<String>,
    value: u32,
}

#[derive(Clone, Copy)]
enum PendingTarget {
    Lot(u32),
    Data(u32),
    Raw(u32),
}

/// Assembles a module image.
///
/// # Examples
/// ```rust
/// use mlink::format::{ModuleBuilder, ModuleHeader, SymbolLocation};
///
/// let mut builder = ModuleBuilder::new("counter");
/// builder.lot_entries(1).data(&0u32.to_ne_bytes());
/// let count = builder.exported("count", SymbolLocation::Data, 0);
/// builder.lot_reloc(0, count);
/// let image = builder.build().unwrap();
/// let header = ModuleHeader::parse(&image).unwrap();
/// assert_eq!(header.lot_entry_count, 1);
/// ```
pub struct ModuleBuilder {
    lot_entries: u16,
    code: Vec<u8>,
    data: Vec<u8>,
    bss: u32,
    symbols: Vec<PendingSymbol>,
    relocations: Vec<(PendingTarget, u32)>,
}

impl ModuleBuilder {
    /// Starts a module called `name`; the name becomes symbol 0.
    pub fn new(name: &str) -> Self {
        Self {
            lot_entries: 0,
            code: Vec::new(),
            data: Vec::new(),
            bss: 0,
            symbols: vec![PendingSymbol {
                kind: SymbolKind::Name,
                location: SymbolLocation::Data,
                name: Some(String::from(name)),
                value: 0,
            }],
            relocations: Vec::new(),
        }
    }

    /// Sets the number of Linkage Table slots.
    pub fn lot_entries(&mut self, count: u16) -> &mut Self {
        self.lot_entries = count;
        self
    }

    /// Sets the code section. It is padded to a word in the image.
    pub fn code(&mut self, bytes: &[u8]) -> &mut Self {
        self.code = bytes.to_vec();
        self
    }

    /// Sets the initialized data section.
    pub fn data(&mut self, bytes: &[u8]) -> &mut Self {
        self.data = bytes.to_vec();
        self
    }

    /// Sets the size of the zero-initialized section.
    pub fn bss(&mut self, size: u32) -> &mut Self {
        self.bss = size;
        self
    }

    /// Adds a module-private symbol and returns its index.
    pub fn local(&mut self, location: SymbolLocation, value: u32) -> u32 {
        self.push(SymbolKind::Local, location, None, value)
    }

    /// Adds an exported symbol and returns its index.
    pub fn exported(&mut self, name: &str, location: SymbolLocation, value: u32) -> u32 {
        self.push(SymbolKind::Exported, location, Some(name), value)
    }

    /// Adds an extern symbol, to be resolved by the host, and returns its index.
    pub fn external(&mut self, name: &str) -> u32 {
        self.push(SymbolKind::Extern, SymbolLocation::Data, Some(name), 0)
    }

    /// Relocates Linkage Table slot `slot` to `symbol`.
    pub fn lot_reloc(&mut self, slot: u32, symbol: u32) -> &mut Self {
        self.relocations.push((PendingTarget::Lot(slot), symbol));
        self
    }

    /// Relocates the data word at index `word` to `symbol`.
    pub fn data_reloc(&mut self, word: u32, symbol: u32) -> &mut Self {
        self.relocations.push((PendingTarget::Data(word), symbol));
        self
    }

    /// Adds a relocation with a raw `lot_offset`, exactly as it will be encoded.
    pub fn raw_reloc(&mut self, lot_offset: u32, symbol: u32) -> &mut Self {
        self.relocations.push((PendingTarget::Raw(lot_offset), symbol));
        self
    }

    /// Header the built image will carry.
    ///
    /// Fails with [`Error::BadRelocationTable`] when there are more
    /// relocations than the header can count, and with
    /// [`Error::MalformedImage`] when a section does not fit the format.
    pub fn header(&self) -> Result<ModuleHeader> {
        let relocation_count =
            u16::try_from(self.relocations.len()).map_err(|_| Error::BadRelocationTable)?;
        let symbol_table_size =
            u32::try_from(self.symbol_table().len()).map_err(|_| Error::MalformedImage)?;
        let code_size = u32::try_from(self.code.len()).map_err(|_| Error::MalformedImage)?;
        let data_size = u32::try_from(self.data.len()).map_err(|_| Error::MalformedImage)?;
        let header = ModuleHeader {
            signature: MODULE_MAGIC,
            lot_entry_count: self.lot_entries,
            relocation_count,
            symbol_table_size,
            code_size: align_word(code_size),
            data_size,
            bss_size: self.bss,
        };
        // Image offsets are 32-bit.
        let total = layout::code_offset(&header) as u64
            + header.code_size as u64
            + data_size as u64;
        if total >= u32::MAX as u64 || header.code_size < code_size {
            return Err(Error::MalformedImage);
        }
        Ok(header)
    }

    /// Encodes the image.
    ///
    /// Fails like [`ModuleBuilder::header`], and with
    /// [`Error::BadRelocationTable`] when a data relocation's word index
    /// does not fit a `lot_offset`.
    pub fn build(&self) -> Result<Vec<u8>> {
        let header = self.header()?;
        let mut image = vec![0u8; layout::image_size(&header) as usize];
        header.write(&mut image).ok_or(Error::MalformedImage)?;

        let mut cursor = layout::relocations_offset() as usize;
        for &(target, symbol) in &self.relocations {
            let lot_offset = match target {
                PendingTarget::Lot(slot) => slot,
                PendingTarget::Data(word) => (self.lot_entries as u32)
                    .checked_add(word)
                    .ok_or(Error::BadRelocationTable)?,
                PendingTarget::Raw(offset) => offset,
            };
            image[cursor..cursor + 4].copy_from_slice(&lot_offset.to_ne_bytes());
            image[cursor + 4..cursor + 8].copy_from_slice(&symbol.to_ne_bytes());
            cursor += 2 * WORD_SIZE as usize;
        }

        let symbols = self.symbol_table();
        image[cursor..cursor + symbols.len()].copy_from_slice(&symbols);

        let code = layout::code_offset(&header) as usize;
        image[code..code + self.code.len()].copy_from_slice(&self.code);
        let data = code + header.code_size as usize;
        image[data..data + self.data.len()].copy_from_slice(&self.data);
        Ok(image)
    }

    fn push(
        &mut self,
        kind: SymbolKind,
        location: SymbolLocation,
        name: Option<&str>,
        value: u32,
    ) -> u32 {
        self.symbols.push(PendingSymbol {
            kind,
            location,
            name: name.map(String::from),
            value,
        });
        self.symbols.len() as u32 - 1
    }

    /// Encodes the symbol table, padded to a word.
    fn symbol_table(&self) -> Vec<u8> {
        let count = self.symbols.len() as u32;
        let mut entries = Vec::with_capacity((4 + count * SYMBOL_ENTRY_SIZE) as usize);
        let mut names = Vec::new();
        let names_base = 4 + count * SYMBOL_ENTRY_SIZE;
        entries.extend_from_slice(&count.to_ne_bytes());
        for symbol in &self.symbols {
            let name_offset = match &symbol.name {
                Some(name) => {
                    let offset = names_base + names.len() as u32;
                    names.extend_from_slice(name.as_bytes());
                    names.push(0);
                    offset
                }
                None => 0,
            };
            entries.extend_from_slice(&pack(symbol.kind, symbol.location, name_offset).to_ne_bytes());
            entries.extend_from_slice(&symbol.value.to_ne_bytes());
        }
        entries.extend_from_slice(&names);
        entries.resize(align_word(entries.len() as u32) as usize, 0);
        entries
    }
}
