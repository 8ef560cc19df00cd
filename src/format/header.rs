//! Module header parsing and validation

use super::{read_u32, write_u32};
use crate::{Error, Result};

/// Signature found in the first word of every module image.
pub const MODULE_MAGIC: u32 =
    (b'M' as u32) << 24 | (b'L' as u32) << 16 | (b'D' as u32) << 8 | b'U' as u32;

/// The fixed-size header at the start of a module image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHeader {
    /// Must equal [`MODULE_MAGIC`].
    pub signature: u32,
    /// Number of Linkage Table slots the module needs.
    pub lot_entry_count: u16,
    /// Number of relocation entries following the header.
    pub relocation_count: u16,
    /// Size of the symbol table in bytes.
    pub symbol_table_size: u32,
    /// Size of the code section in bytes.
    pub code_size: u32,
    /// Size of the initialized data section in bytes.
    pub data_size: u32,
    /// Size of the zero-initialized data following `.data`.
    pub bss_size: u32,
}

impl ModuleHeader {
    /// Encoded size of the header.
    pub const SIZE: u32 = 24;

    /// Parses and validates the header at the start of `bytes`.
    ///
    /// # Errors
    /// * [`Error::InvalidSignature`] - the image does not start with [`MODULE_MAGIC`].
    /// * [`Error::MalformedImage`] - the signature is present but the header is cut short.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let signature = read_u32(bytes, 0).ok_or(Error::InvalidSignature)?;
        if signature != MODULE_MAGIC {
            return Err(Error::InvalidSignature);
        }
        if bytes.len() < Self::SIZE as usize {
            return Err(Error::MalformedImage);
        }
        let counts = read_u32(bytes, 4).ok_or(Error::MalformedImage)?.to_ne_bytes();
        let word = |offset| read_u32(bytes, offset).ok_or(Error::MalformedImage);
        Ok(Self {
            signature,
            lot_entry_count: u16::from_ne_bytes([counts[0], counts[1]]),
            relocation_count: u16::from_ne_bytes([counts[2], counts[3]]),
            symbol_table_size: word(8)?,
            code_size: word(12)?,
            data_size: word(16)?,
            bss_size: word(20)?,
        })
    }

    /// Encodes the header into the first [`ModuleHeader::SIZE`] bytes of `out`.
    ///
    /// Returns `None` if `out` is too short.
    pub fn write(&self, out: &mut [u8]) -> Option<()> {
        let counts = out.get_mut(4..8)?;
        counts[..2].copy_from_slice(&self.lot_entry_count.to_ne_bytes());
        counts[2..].copy_from_slice(&self.relocation_count.to_ne_bytes());
        write_u32(out, 0, self.signature)?;
        write_u32(out, 8, self.symbol_table_size)?;
        write_u32(out, 12, self.code_size)?;
        write_u32(out, 16, self.data_size)?;
        write_u32(out, 20, self.bss_size)
    }
}
