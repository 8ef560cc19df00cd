use crate::Addr;
use alloc::rc::Rc;

/// Resolves extern symbols against the host program.
///
/// The relocation engine calls this for every relocation that targets an
/// `Extern` symbol. Returning `None`, or an address of `0`, fails the load
/// with [`Error::UnknownSymbol`](crate::Error::UnknownSymbol).
///
/// # Examples
///
/// Using a closure for simple lookups:
/// ```rust
/// use mlink::relocation::HostResolver;
///
/// let resolver = |name: &str| match name {
///     "printf" => Some(0x0800_1235),
///     _ => None,
/// };
/// assert_eq!(resolver.resolve("printf"), Some(0x0800_1235));
/// ```
pub trait HostResolver {
    /// Finds the target address of the host symbol `name`.
    fn resolve(&self, name: &str) -> Option<Addr>;
}

impl<F: ?Sized> HostResolver for F
where
    F: Fn(&str) -> Option<Addr>,
{
    fn resolve(&self, name: &str) -> Option<Addr> {
        self(name)
    }
}

impl HostResolver for () {
    fn resolve(&self, _name: &str) -> Option<Addr> {
        None
    }
}

impl<R: HostResolver + ?Sized> HostResolver for Rc<R> {
    fn resolve(&self, name: &str) -> Option<Addr> {
        (**self).resolve(name)
    }
}
