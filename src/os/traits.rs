use crate::Addr;
use alloc::{boxed::Box, vec::Vec};
use core::slice;

/// A block of module RAM handed out by an [`Allocator`].
///
/// The storage is word aligned. `base` is where the block lives in the
/// target address space; the loader computes every relocated address from it.
#[derive(Debug)]
pub struct RamBlock {
    base: Addr,
    words: Box<[u32]>,
    len: usize,
}

impl RamBlock {
    /// Allocates a zero-filled block of `len` bytes at target address `base`.
    ///
    /// Returns `None` if the global allocator cannot provide the storage.
    pub fn try_zeroed(base: Addr, len: usize) -> Option<Self> {
        let count = len.div_ceil(size_of::<u32>());
        let mut words = Vec::new();
        words.try_reserve_exact(count).ok()?;
        words.resize(count, 0);
        Some(Self {
            base,
            words: words.into_boxed_slice(),
            len,
        })
    }

    /// Moves the block to a different target address.
    #[inline]
    pub fn with_base(mut self, base: Addr) -> Self {
        self.base = base;
        self
    }

    #[inline]
    pub fn base(&self) -> Addr {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // The word storage covers at least `len` bytes.
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast(), self.len) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), self.len) }
    }
}

/// RAM supplied by the caller for a single module.
///
/// The loader writes into it but never releases it: the borrow simply ends
/// when the module is unloaded and the loader is dropped.
#[derive(Debug)]
pub struct ForeignRam<'a> {
    base: Addr,
    bytes: &'a mut [u8],
}

impl<'a> ForeignRam<'a> {
    /// Wraps `bytes`, located at `base` in the target address space.
    #[inline]
    pub fn new(base: Addr, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Wraps `bytes` at its own native address.
    #[cfg(target_pointer_width = "32")]
    #[inline]
    pub fn resident(bytes: &'a mut [u8]) -> Self {
        Self {
            base: bytes.as_ptr() as usize as Addr,
            bytes,
        }
    }

    #[inline]
    pub fn base(&self) -> Addr {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// A source of RAM for loaded modules.
///
/// This is the loader's only dependency on the platform's memory manager.
/// Blocks returned by [`Allocator::allocate`] are handed back through
/// [`Allocator::release`] when their module is unloaded or its load fails.
///
/// # Example
/// ```rust
/// use mlink::os::{Allocator, RamBlock};
///
/// /// Hands out one fixed window, once.
/// struct OneShot(Option<u32>);
///
/// impl Allocator for OneShot {
///     fn allocate(&mut self, size: usize) -> Option<RamBlock> {
///         RamBlock::try_zeroed(self.0.take()?, size)
///     }
///
///     fn release(&mut self, block: RamBlock) {
///         self.0 = Some(block.base());
///     }
/// }
/// ```
pub trait Allocator {
    /// Allocates `size` bytes of module RAM, or `None` if none is available.
    fn allocate(&mut self, size: usize) -> Option<RamBlock>;

    /// Returns a block previously obtained from [`Allocator::allocate`].
    fn release(&mut self, block: RamBlock);
}

impl<A: Allocator + ?Sized> Allocator for &mut A {
    fn allocate(&mut self, size: usize) -> Option<RamBlock> {
        (**self).allocate(size)
    }

    fn release(&mut self, block: RamBlock) {
        (**self).release(block)
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn allocate(&mut self, size: usize) -> Option<RamBlock> {
        (**self).allocate(size)
    }

    fn release(&mut self, block: RamBlock) {
        (**self).release(block)
    }
}
