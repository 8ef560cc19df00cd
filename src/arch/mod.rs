//! Instruction-set specific patching of exported function prologues.
//!
//! Module code compiled for the Linkage Table calling convention recovers
//! its LOT base on entry by calling a host accessor with its own program
//! counter. The accessor's address is not known when the module is built,
//! so each exported function carries a placeholder word inside its prologue
//! that the host fills in after loading.
//!
//! Where that word sits depends on the exact prologue the toolchain emits.
//! Each supported shape is a [`LotPrologue`].

mod thumb;

pub use thumb::{PROLOGUE_LEN, ThumbPrologue};

use crate::{Addr, Error, Result, format::write_u32};

/// A prologue shape carrying a patchable accessor word.
pub trait LotPrologue {
    /// Distance in bytes from a function's entry point to the accessor word.
    fn offset(&self) -> u32;

    /// Writes `accessor` into the prologue of the function at `entry`.
    ///
    /// `code` is the module's code section and `entry` the function's
    /// offset inside it. Fails with [`Error::MalformedImage`] if the
    /// accessor word falls outside `code`.
    fn patch(&self, code: &mut [u8], entry: u32, accessor: Addr) -> Result<()> {
        let at = entry
            .checked_add(self.offset())
            .ok_or(Error::MalformedImage)?;
        write_u32(code, at as usize, accessor).ok_or(Error::MalformedImage)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        /// The prologue shape of the running target.
        pub type NativePrologue = ThumbPrologue;
    }
}
