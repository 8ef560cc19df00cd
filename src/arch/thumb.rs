//! Cortex-M (Thumb-2) prologue.

use super::LotPrologue;

/// Length in bytes of the Thumb prologue that precedes the accessor word.
pub const PROLOGUE_LEN: u32 = 18;

/// The prologue emitted for Cortex-M modules.
///
/// The accessor word is written at the symbol value plus [`PROLOGUE_LEN`].
/// Exported function values keep their Thumb bit, exactly as the module
/// toolchain emits them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThumbPrologue;

impl LotPrologue for ThumbPrologue {
    #[inline]
    fn offset(&self) -> u32 {
        PROLOGUE_LEN
    }
}
