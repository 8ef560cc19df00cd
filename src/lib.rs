//! # mlink
//! A micro dynamic linker for MMU-less microcontrollers.
//!
//! `mlink` loads relocatable code modules at runtime, fills in each module's
//! Linkage Table (LOT) and data relocations, resolves extern references
//! against the host program and makes exported functions and variables
//! available for lookup. There is no OS loader underneath: RAM comes from a
//! pluggable [`os::Allocator`] and extern symbols from a pluggable
//! [`relocation::HostResolver`].
//!
//! ## Load modes
//! * [`LoadMode::CopyAll`] copies the whole image into RAM; the source can be
//!   discarded afterwards.
//! * [`LoadMode::CopyCode`] copies code and data; the header, relocations and
//!   symbol table stay in the source image.
//! * [`LoadMode::ExecuteInPlace`] copies only data; code runs from the
//!   source image.
//!
//! ## Example
//! ```rust
//! use mlink::{Loader, LoadMode, format::{ModuleBuilder, ModuleImage}, os::RegionAllocator};
//!
//! let mut builder = ModuleBuilder::new("answer");
//! builder.data(&42u32.to_ne_bytes());
//! builder.exported("answer", mlink::format::SymbolLocation::Data, 0);
//! let bytes = builder.build().unwrap();
//!
//! let mut loader = Loader::new(2, RegionAllocator::new(0x2000_0000, 0x1000));
//! let image = ModuleImage::new(0x0800_0000, &bytes);
//! let module = loader.load(image, None, LoadMode::ExecuteInPlace).unwrap();
//! let addr = loader.symbol_value(Some(module), "answer");
//! assert_eq!(loader.read_u32(addr), Some(42));
//! ```
#![no_std]
extern crate alloc;

#[macro_use]
mod macros;

pub mod arch;
mod debug;
mod error;
pub mod format;
mod loader;
mod lookup;
mod module;
pub mod os;
mod registry;
pub mod relocation;

pub use debug::DebugLevel;
pub use error::Error;
pub use format::{LoadMode, Symbol};
pub use loader::Loader;
pub use module::Module;
pub use registry::ModuleHandle;

/// An address in the target's 32-bit address space.
pub type Addr = u32;

pub type Result<T> = core::result::Result<T, Error>;
