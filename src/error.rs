use core::fmt::Display;

/// Error types returned by the loader.
///
/// Every failure is a plain value: loading a malformed image never panics,
/// and a failed load has already released whatever it acquired by the time
/// the error reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The image does not start with the module signature.
    InvalidSignature,

    /// The RAM region supplied by the caller is smaller than the module needs.
    RamTooSmall,

    /// The allocator could not provide RAM for the module.
    OutOfMemory,

    /// The module cannot execute from its source location.
    ///
    /// Reserved: no check currently produces it.
    UnableToExecuteInPlace,

    /// Every registry slot is occupied.
    NoMoreHandles,

    /// A raw load mode value does not name a known mode.
    InvalidLoadMode,

    /// A relocation references a missing symbol, targets the module name
    /// symbol, or writes outside the module's data.
    BadRelocationTable,

    /// The host could not resolve an extern symbol.
    UnknownSymbol,

    /// A module with the same name is already loaded.
    DuplicateName,

    /// The handle does not refer to a loaded module.
    InvalidModule,

    /// The image is inconsistent with its own header.
    ///
    /// This covers truncated images, name offsets that leave the symbol
    /// table, names that are not UTF-8 and a first symbol that is not the
    /// module name.
    MalformedImage,
}

impl Error {
    /// Stable name of the error, suitable for diagnostics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::InvalidSignature => "invalid module signature",
            Error::RamTooSmall => "RAM region too small",
            Error::OutOfMemory => "out of memory",
            Error::UnableToExecuteInPlace => "unable to execute in place",
            Error::NoMoreHandles => "no more module handles",
            Error::InvalidLoadMode => "invalid load mode",
            Error::BadRelocationTable => "bad relocation table",
            Error::UnknownSymbol => "unknown symbol",
            Error::DuplicateName => "duplicate module name",
            Error::InvalidModule => "invalid module",
            Error::MalformedImage => "malformed module image",
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::error::Error for Error {}
