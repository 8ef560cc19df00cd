use crate::{Error, Module, Result};
use alloc::{boxed::Box, vec::Vec};

/// Names a loaded module.
///
/// A handle stays valid until its module is unloaded. Each slot carries a
/// generation counter, so a handle kept past unload is rejected even after
/// the slot has been reused. A slot whose counter is exhausted is retired
/// rather than wrapped, so no two handles ever compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    slot: u16,
    generation: u16,
}

impl ModuleHandle {
    /// Index of the registry slot this handle refers to.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

#[derive(Debug, Default)]
struct Slot<'a> {
    generation: u16,
    retired: bool,
    module: Option<Module<'a>>,
}

/// Fixed-capacity table of loaded modules.
#[derive(Debug)]
pub(crate) struct Registry<'a> {
    slots: Box<[Slot<'a>]>,
}

impl<'a> Registry<'a> {
    pub(crate) fn new(capacity: u16) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.resize_with(capacity as usize, Slot::default);
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.iter().count()
    }

    /// Reserves the first free slot. The slot stays empty until [`Registry::commit`].
    pub(crate) fn allocate_slot(&self) -> Result<u16> {
        self.slots
            .iter()
            .position(|slot| slot.module.is_none() && !slot.retired)
            .map(|index| index as u16)
            .ok_or(Error::NoMoreHandles)
    }

    /// Whether a loaded module is already called `name`.
    pub(crate) fn name_conflict(&self, name: &str) -> bool {
        self.iter().any(|(_, module)| module.name() == name)
    }

    pub(crate) fn commit(&mut self, slot: u16, module: Module<'a>) -> ModuleHandle {
        let entry = &mut self.slots[slot as usize];
        debug_assert!(entry.module.is_none());
        entry.module = Some(module);
        ModuleHandle {
            slot,
            generation: entry.generation,
        }
    }

    /// Empties the slot `handle` refers to and invalidates every copy of it.
    pub(crate) fn free_slot(&mut self, handle: ModuleHandle) -> Result<Module<'a>> {
        let entry = self
            .slots
            .get_mut(handle.slot())
            .filter(|entry| entry.generation == handle.generation)
            .ok_or(Error::InvalidModule)?;
        let module = entry.module.take().ok_or(Error::InvalidModule)?;
        match entry.generation.checked_add(1) {
            Some(next) => entry.generation = next,
            None => entry.retired = true,
        }
        Ok(module)
    }

    /// Whether the slot behind `handle` can no longer be reused.
    pub(crate) fn is_retired(&self, handle: ModuleHandle) -> bool {
        self.slots
            .get(handle.slot())
            .is_some_and(|entry| entry.retired)
    }

    pub(crate) fn get(&self, handle: ModuleHandle) -> Option<&Module<'a>> {
        self.slots
            .get(handle.slot())
            .filter(|entry| entry.generation == handle.generation)?
            .module
            .as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: ModuleHandle) -> Option<&mut Module<'a>> {
        self.slots
            .get_mut(handle.slot())
            .filter(|entry| entry.generation == handle.generation)?
            .module
            .as_mut()
    }

    /// Loaded modules in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ModuleHandle, &Module<'a>)> {
        self.slots.iter().enumerate().filter_map(|(index, entry)| {
            let module = entry.module.as_ref()?;
            let handle = ModuleHandle {
                slot: index as u16,
                generation: entry.generation,
            };
            Some((handle, module))
        })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ModuleHandle, &mut Module<'a>)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, entry)| {
            let module = entry.module.as_mut()?;
            let handle = ModuleHandle {
                slot: index as u16,
                generation: entry.generation,
            };
            Some((handle, module))
        })
    }
}
