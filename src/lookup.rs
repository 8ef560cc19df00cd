use crate::{
    Addr, LoadMode, Loader, Module, ModuleHandle, Symbol,
    arch::LotPrologue,
    format::{SymbolKind, SymbolLocation},
    os::Allocator,
    relocation::HostResolver,
};
use alloc::vec::Vec;

impl<'a, A: Allocator, R: HostResolver> Loader<'a, A, R> {
    /// Finds a loaded module by exact name.
    pub fn find_module(&self, name: &str) -> Option<ModuleHandle> {
        self.registry
            .iter()
            .find(|(_, module)| module.name() == name)
            .map(|(handle, _)| handle)
    }

    /// The name of a loaded module.
    pub fn module_name(&self, handle: ModuleHandle) -> Option<&str> {
        self.registry.get(handle).map(Module::name)
    }

    /// Looks up a symbol by name, already rebased to its absolute address.
    ///
    /// With `Some(module)` only that module's symbol table is searched;
    /// with `None` every loaded module is searched in registry order and
    /// the first match wins. Extern references are skipped, since their
    /// value is only known to the host. This differs from udynlink's
    /// `udynlink_lookup_symbol`, which returns the first entry with a
    /// matching name whatever its kind; a global search here moves on to
    /// the module that defines the name instead of stopping at a reference.
    pub fn find_symbol(&self, scope: Option<ModuleHandle>, name: &str) -> Option<Symbol<'_>> {
        let found = self
            .scoped(scope)
            .find_map(|module| find_in(module, name).map(|symbol| (module, symbol)));
        match found {
            Some((module, symbol)) => {
                diag!(
                    self.level,
                    Info,
                    "found symbol '{}' in module '{}' at {:#010x}",
                    name,
                    module.name(),
                    symbol.value
                );
                Some(symbol)
            }
            None => {
                diag!(self.level, Info, "symbol '{}' not found", name);
                None
            }
        }
    }

    /// The address of a symbol, or `0` if it cannot be found.
    #[inline]
    pub fn symbol_value(&self, scope: Option<ModuleHandle>, name: &str) -> Addr {
        self.find_symbol(scope, name).map_or(0, |symbol| symbol.value)
    }

    /// Writes `accessor` into the prologue of every exported function.
    ///
    /// `scope` selects one module or, with `None`, every loaded module.
    /// Modules whose code executes in place are skipped, as are entries
    /// whose accessor word would fall outside the code section. Returns the
    /// number of functions patched.
    pub fn patch_exported_functions<P>(
        &mut self,
        scope: Option<ModuleHandle>,
        prologue: &P,
        accessor: Addr,
    ) -> usize
    where
        P: LotPrologue + ?Sized,
    {
        let level = self.level;
        let mut patched = 0;
        for (handle, module) in self.registry.iter_mut() {
            if scope.is_some_and(|scope| scope != handle) {
                continue;
            }
            if module.mode() == LoadMode::ExecuteInPlace {
                diag!(
                    level,
                    Warning,
                    "module '{}' executes in place, prologues left unpatched",
                    module.name()
                );
                continue;
            }
            let entries: Vec<Addr> = module
                .symbols()
                .iter()
                .filter(|symbol| {
                    symbol.kind == SymbolKind::Exported && symbol.location == SymbolLocation::Code
                })
                .map(|symbol| symbol.value)
                .collect();
            let Some(code) = module.code_mut() else {
                continue;
            };
            for entry in entries {
                match prologue.patch(code, entry, accessor) {
                    Ok(()) => patched += 1,
                    Err(_) => diag!(
                        level,
                        Warning,
                        "prologue of function at code offset {:#x} lies outside the code",
                        entry
                    ),
                }
            }
        }
        patched
    }

    /// The Linkage Table base of the module whose code contains `pc`, or `0`.
    pub fn lot_base_for_pc(&self, pc: Addr) -> Addr {
        self.registry
            .iter()
            .find(|(_, module)| module.code_contains(pc))
            .map_or(0, |(_, module)| module.ram_base())
    }

    fn scoped(&self, scope: Option<ModuleHandle>) -> impl Iterator<Item = &Module<'a>> {
        self.registry
            .iter()
            .filter(move |(handle, _)| scope.is_none_or(|scope| scope == *handle))
            .map(|(_, module)| module)
    }
}

fn find_in<'m>(module: &'m Module<'_>, name: &str) -> Option<Symbol<'m>> {
    module
        .symbols()
        .iter()
        .find(|symbol| symbol.kind != SymbolKind::Extern && symbol.name == Some(name))
        .map(|symbol| symbol.rebase(module.layout()))
}
