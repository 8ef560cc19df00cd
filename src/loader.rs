use crate::{
    Addr, DebugLevel, Error, LoadMode, Module, ModuleHandle, Result,
    format::{Layout, ModuleHeader, ModuleImage, SymbolTable, layout, symbol_table_bytes},
    module::Ram,
    os::{Allocator, ForeignRam},
    registry::Registry,
    relocation::{HostResolver, RelocationContext, relocate},
};

/// The module loader.
///
/// Owns a fixed-capacity registry of loaded modules, the allocator their RAM
/// comes from and the resolver used for extern symbols. Several loaders can
/// coexist; each is fully independent.
///
/// `'a` bounds the source images of modules that keep referencing them
/// (`CopyCode` and `ExecuteInPlace`) and any caller-supplied RAM.
pub struct Loader<'a, A: Allocator, R: HostResolver = ()> {
    pub(crate) registry: Registry<'a>,
    allocator: A,
    resolver: R,
    pub(crate) level: DebugLevel,
}

impl<'a, A: Allocator> Loader<'a, A> {
    /// Creates a loader with room for `capacity` modules that resolves no
    /// extern symbols.
    pub fn new(capacity: u16, allocator: A) -> Self {
        Self {
            registry: Registry::new(capacity),
            allocator,
            resolver: (),
            level: DebugLevel::None,
        }
    }
}

impl<'a, A: Allocator, R: HostResolver> Loader<'a, A, R> {
    /// Replaces the extern symbol resolver.
    ///
    /// # Examples
    /// ```rust
    /// use mlink::{Loader, os::RegionAllocator};
    ///
    /// let loader = Loader::new(4, RegionAllocator::new(0x2000_0000, 0x1000))
    ///     .with_resolver(|name: &str| (name == "printf").then_some(0x0800_1235));
    /// assert_eq!(loader.capacity(), 4);
    /// ```
    pub fn with_resolver<S: HostResolver>(self, resolver: S) -> Loader<'a, A, S> {
        Loader {
            registry: self.registry,
            allocator: self.allocator,
            resolver,
            level: self.level,
        }
    }

    #[inline]
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        self.level
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    #[inline]
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    #[inline]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Maximum number of modules loaded at once.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// Number of modules currently loaded.
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads, places and relocates the module in `image`.
    ///
    /// RAM comes from `ram` when supplied, otherwise from the allocator.
    /// `CopyCode` and `ExecuteInPlace` keep reading the image, so it is
    /// borrowed for as long as the loader lives.
    ///
    /// On failure nothing is retained: owned RAM is released and the
    /// registry slot stays free.
    pub fn load(
        &mut self,
        image: ModuleImage<'a>,
        ram: Option<ForeignRam<'a>>,
        mode: LoadMode,
    ) -> Result<ModuleHandle> {
        let retained = match mode {
            LoadMode::CopyAll => None,
            LoadMode::CopyCode | LoadMode::ExecuteInPlace => Some(image.bytes()),
        };
        let (slot, header, layout, ram) = self.place(image, ram, mode)?;
        let module = Module::new(header, layout, ram, retained);
        Ok(self.commit(slot, module))
    }

    /// Loads the module in `image` in `CopyAll` mode.
    ///
    /// Everything the module needs is copied, so the image may be dropped
    /// or overwritten as soon as this returns.
    pub fn load_copy(
        &mut self,
        image: ModuleImage<'_>,
        ram: Option<ForeignRam<'a>>,
    ) -> Result<ModuleHandle> {
        let (slot, header, layout, ram) = self.place(image, ram, LoadMode::CopyAll)?;
        let module = Module::new(header, layout, ram, None);
        Ok(self.commit(slot, module))
    }

    /// Unloads a module, releasing its RAM unless the caller supplied it.
    pub fn unload(&mut self, handle: ModuleHandle) -> Result<()> {
        let module = self.registry.free_slot(handle).inspect_err(|err| {
            diag!(self.level, Error, "unload failed: {}", err);
        })?;
        diag!(self.level, Info, "unloading module '{}'", module.name());
        if self.registry.is_retired(handle) {
            diag!(
                self.level,
                Warning,
                "slot {} has used up its handles and is retired",
                handle.slot()
            );
        }
        if let Some(Ram::Owned(block)) = module.into_ram() {
            self.allocator.release(block);
        }
        Ok(())
    }

    /// The module `handle` refers to, if it is still loaded.
    #[inline]
    pub fn module(&self, handle: ModuleHandle) -> Option<&Module<'a>> {
        self.registry.get(handle)
    }

    #[inline]
    pub fn module_mut(&mut self, handle: ModuleHandle) -> Option<&mut Module<'a>> {
        self.registry.get_mut(handle)
    }

    /// Loaded modules in registry order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleHandle, &Module<'a>)> {
        self.registry.iter()
    }

    fn commit(&mut self, slot: u16, module: Module<'a>) -> ModuleHandle {
        diag!(
            self.level,
            Info,
            "module '{}' loaded in slot {}",
            module.name(),
            slot
        );
        self.registry.commit(slot, module)
    }

    /// Runs every load step up to the commit.
    fn place(
        &mut self,
        image: ModuleImage<'_>,
        ram: Option<ForeignRam<'a>>,
        mode: LoadMode,
    ) -> Result<(u16, ModuleHeader, Layout, Option<Ram<'a>>)> {
        let result = self.try_place(image, ram, mode);
        if let Err(err) = &result {
            diag!(self.level, Error, "load failed: {}", err);
        }
        result
    }

    fn try_place(
        &mut self,
        image: ModuleImage<'_>,
        ram: Option<ForeignRam<'a>>,
        mode: LoadMode,
    ) -> Result<(u16, ModuleHeader, Layout, Option<Ram<'a>>)> {
        let slot = self.registry.allocate_slot()?;
        let header = image.header()?;
        image.validate(&header)?;
        let level = self.level;
        let name = image.name(&header).inspect_err(|err| {
            diag!(level, Error, "module name symbol is unreadable: {}", err);
        })?;
        diag!(
            self.level,
            Info,
            "loading module '{}' from {:#010x} in mode {:?}",
            name,
            image.base(),
            mode
        );
        if self.registry.name_conflict(name) {
            return Err(Error::DuplicateName);
        }

        let mut ram = self.acquire_ram(layout::required_ram_size(&header, mode), ram)?;
        let ram_base = ram.as_ref().map_or(0, Ram::base);
        let layout = Layout::new(&header, mode, image.base(), ram_base);
        if let Err(err) = self.populate(image, &header, &layout, ram.as_mut()) {
            if let Some(Ram::Owned(block)) = ram {
                self.allocator.release(block);
            }
            return Err(err);
        }
        Ok((slot, header, layout, ram))
    }

    fn acquire_ram(&mut self, size: u32, ram: Option<ForeignRam<'a>>) -> Result<Option<Ram<'a>>> {
        if size == 0 {
            diag!(self.level, Info, "module needs no RAM");
            return Ok(None);
        }
        match ram {
            Some(ram) if ram.len() < size as usize => {
                diag!(
                    self.level,
                    Error,
                    "supplied RAM holds {} bytes, module needs {}",
                    ram.len(),
                    size
                );
                Err(Error::RamTooSmall)
            }
            Some(ram) => {
                diag!(
                    self.level,
                    Info,
                    "using {} bytes of supplied RAM at {:#010x}",
                    size,
                    ram.base()
                );
                Ok(Some(Ram::Foreign(ram)))
            }
            None => {
                let block = self
                    .allocator
                    .allocate(size as usize)
                    .ok_or(Error::OutOfMemory)?;
                diag!(
                    self.level,
                    Info,
                    "allocated {} bytes of RAM at {:#010x}",
                    size,
                    block.base()
                );
                Ok(Some(Ram::Owned(block)))
            }
        }
    }

    /// Copies the sections the mode needs, zeroes `.bss` and relocates.
    fn populate(
        &self,
        image: ModuleImage<'_>,
        header: &ModuleHeader,
        layout: &Layout,
        ram: Option<&mut Ram<'a>>,
    ) -> Result<()> {
        let code_offset = layout.code_offset();
        let source_start = match layout.mode() {
            LoadMode::CopyAll => 0,
            LoadMode::CopyCode => code_offset,
            LoadMode::ExecuteInPlace => code_offset.saturating_add(layout.code_size()),
        } as usize;
        let source = image
            .bytes()
            .get(source_start..layout::image_size(header) as usize)
            .ok_or(Error::MalformedImage)?;

        let mut empty: [u8; 0] = [];
        let bytes: &mut [u8] = match ram {
            Some(ram) => ram.bytes_mut(),
            None => &mut empty,
        };

        let lot_size = layout.lot_size() as usize;
        if !source.is_empty() {
            bytes
                .get_mut(lot_size..lot_size + source.len())
                .ok_or(Error::RamTooSmall)?
                .copy_from_slice(source);
            diag!(
                self.level,
                Info,
                "copied {} bytes to {:#010x}",
                source.len(),
                layout.ram_base().wrapping_add(lot_size as u32)
            );
        }

        let data_start = layout.data_ram_offset() as usize;
        let data_len = layout.data_size() as usize + layout.bss_size() as usize;
        let (lot, rest) = bytes
            .split_at_mut_checked(lot_size)
            .ok_or(Error::RamTooSmall)?;
        let (copied, data) = rest
            .split_at_mut_checked(data_start - lot_size)
            .ok_or(Error::RamTooSmall)?;
        let data = data.get_mut(..data_len).ok_or(Error::RamTooSmall)?;
        data[layout.data_size() as usize..].fill(0);

        let copied: &[u8] = copied;
        let metadata = match layout.header_ram_offset() {
            Some(_) => copied,
            None => image.bytes(),
        };
        let metadata = metadata
            .get(..code_offset as usize)
            .ok_or(Error::MalformedImage)?;

        relocate(RelocationContext {
            header,
            layout,
            metadata,
            symbols: SymbolTable::new(symbol_table_bytes(metadata, header)),
            lot,
            data,
            resolver: &self.resolver,
            level: self.level,
        })
    }

    /// Reads the word at target address `addr` from whichever loaded module
    /// holds it.
    pub fn read_u32(&self, addr: Addr) -> Option<u32> {
        self.registry
            .iter()
            .find_map(|(_, module)| module.read_u32(addr))
    }

    /// Writes the word at target address `addr` in whichever loaded module's
    /// RAM holds it. Returns `false` if no module does.
    pub fn write_u32(&mut self, addr: Addr, value: u32) -> bool {
        self.registry
            .iter_mut()
            .any(|(_, module)| module.write_u32(addr, value))
    }
}
