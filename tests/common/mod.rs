#![allow(dead_code)]

use mlink::{
    Addr, DebugLevel, Loader,
    format::{ModuleBuilder, SymbolLocation},
    os::{Allocator, RegionAllocator},
    relocation::HostResolver,
};

/// Where module images live in the simulated target.
pub const FLASH_BASE: Addr = 0x0800_0000;
/// Window handed to the region allocator.
pub const RAM_BASE: Addr = 0x2000_0000;
pub const RAM_LEN: u32 = 0x1_0000;
/// Host program variables, outside any module.
pub const HOST_BASE: Addr = 0x1000_0000;
pub const EXT_I_ADDR: Addr = HOST_BASE;

/// Opcodes of the simulated module code: each function starts with one.
pub const OP_FIB_REC: u32 = 0xf1b0_0001;
pub const OP_FIB_TABLE: u32 = 0xf1b0_0002;
pub const OP_SQUARE: u32 = 0x5afe_0001;
pub const OP_SUM_DOUBLE: u32 = 0x5afe_0002;
pub const OP_RUN: u32 = 0xe0e0_0001;

/// LOT slot holding the fib lookup table in the fib module.
pub const FIB_TABLE_SLOT: u32 = 2;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(DebugLevel::Info.to_level_filter())
        .try_init();
}

pub fn region() -> RegionAllocator {
    RegionAllocator::new(RAM_BASE, RAM_LEN)
}

pub fn loader<'a>(capacity: u16) -> Loader<'a, RegionAllocator> {
    init_logger();
    let mut loader = Loader::new(capacity, region());
    loader.set_debug_level(DebugLevel::Info);
    loader
}

pub fn resolve_host(name: &str) -> Option<Addr> {
    match name {
        "ext_i" => Some(EXT_I_ADDR),
        _ => None,
    }
}

pub fn code_words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_ne_bytes()).collect()
}

pub fn fib(n: u32) -> u32 {
    if n < 2 { 1 } else { fib(n - 1) + fib(n - 2) }
}

/// Two implementations of the same sequence: `fib_rec` computes it, while
/// `fib_iter` reads a table the module reaches through its LOT.
pub fn fib_module() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("fib");
    let mut code = vec![0u32; 16];
    code[0] = OP_FIB_REC;
    code[8] = OP_FIB_TABLE;
    let table: Vec<u32> = (0..12).map(fib).collect();
    builder
        .lot_entries(3)
        .code(&code_words(&code))
        .data(&code_words(&table));
    let rec = builder.exported("fib_rec", SymbolLocation::Code, 0);
    let iter = builder.exported("fib_iter", SymbolLocation::Code, 0x20);
    let table = builder.local(SymbolLocation::Data, 0);
    builder
        .lot_reloc(0, rec)
        .lot_reloc(1, iter)
        .lot_reloc(FIB_TABLE_SLOT, table);
    builder.build().unwrap()
}

/// Function pointers and a data pointer stored in `.data`.
pub fn globals_module() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("globals");
    builder
        .lot_entries(1)
        .code(&code_words(&[OP_SQUARE, 0, OP_SUM_DOUBLE, 0]))
        .data(&code_words(&[0, 0, 0, 10]))
        .bss(16);
    let square = builder.local(SymbolLocation::Code, 0);
    let sum_double = builder.local(SymbolLocation::Code, 8);
    let value = builder.local(SymbolLocation::Data, 12);
    builder.exported("square", SymbolLocation::Code, 0);
    builder.exported("sum_double", SymbolLocation::Code, 8);
    builder.exported("square_ptr", SymbolLocation::Data, 0);
    builder.exported("sum_double_ptr", SymbolLocation::Data, 4);
    builder.exported("value_ptr", SymbolLocation::Data, 8);
    let exported_value = builder.exported("value", SymbolLocation::Data, 12);
    builder
        .data_reloc(0, square)
        .data_reloc(1, sum_double)
        .data_reloc(2, value)
        .lot_reloc(0, exported_value);
    builder.build().unwrap()
}

/// Reads and negates the host's `ext_i`, adding its old value to `g`.
pub fn externs_module() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("externs");
    builder
        .lot_entries(2)
        .code(&code_words(&[OP_RUN, 0]))
        .data(&code_words(&[0, 60]));
    builder.exported("run", SymbolLocation::Code, 0);
    let ext = builder.external("ext_i");
    let g = builder.exported("g", SymbolLocation::Data, 4);
    builder
        .lot_reloc(0, ext)
        .lot_reloc(1, g)
        .data_reloc(0, ext);
    builder.build().unwrap()
}

/// A module carrying one exported data word.
pub fn named_module(name: &str, payload: u32) -> Vec<u8> {
    let mut builder = ModuleBuilder::new(name);
    builder.lot_entries(1).data(&payload.to_ne_bytes()).bss(8);
    let symbol = builder.exported("payload", SymbolLocation::Data, 0);
    builder.lot_reloc(0, symbol);
    builder.build().unwrap()
}

/// Host-side variables the modules reference.
#[derive(Debug)]
pub struct HostMemory {
    words: Vec<u32>,
}

impl HostMemory {
    pub fn new(ext_i: i32) -> Self {
        Self {
            words: vec![ext_i as u32, 0, 0, 0],
        }
    }

    pub fn read(&self, addr: Addr) -> Option<u32> {
        let index = addr.checked_sub(HOST_BASE)? / 4;
        self.words.get(index as usize).copied()
    }

    pub fn write(&mut self, addr: Addr, value: u32) -> bool {
        let Some(index) = addr.checked_sub(HOST_BASE).map(|offset| offset / 4) else {
            return false;
        };
        match self.words.get_mut(index as usize) {
            Some(word) => {
                *word = value;
                true
            }
            None => false,
        }
    }

    pub fn ext_i(&self) -> i32 {
        self.words[0] as i32
    }
}

fn read<A: Allocator, R: HostResolver>(
    loader: &Loader<'_, A, R>,
    host: &HostMemory,
    addr: Addr,
) -> Option<u32> {
    loader.read_u32(addr).or_else(|| host.read(addr))
}

fn write<A: Allocator, R: HostResolver>(
    loader: &mut Loader<'_, A, R>,
    host: &mut HostMemory,
    addr: Addr,
    value: u32,
) -> bool {
    loader.write_u32(addr, value) || host.write(addr, value)
}

/// Runs the simulated function at `entry`.
///
/// The function finds its Linkage Table through the loader, the same way
/// real module code does with its program counter.
pub fn call<A: Allocator, R: HostResolver>(
    loader: &mut Loader<'_, A, R>,
    host: &mut HostMemory,
    entry: Addr,
    arg: u32,
) -> Option<u32> {
    let lot = loader.lot_base_for_pc(entry);
    if lot == 0 {
        return None;
    }
    match read(loader, host, entry)? {
        OP_FIB_REC => Some(fib(arg)),
        OP_FIB_TABLE => {
            let table = read(loader, host, lot + 4 * FIB_TABLE_SLOT)?;
            read(loader, host, table + 4 * arg)
        }
        OP_SQUARE => Some(arg * arg),
        OP_SUM_DOUBLE => Some(arg + arg),
        OP_RUN => {
            let ext = read(loader, host, lot)?;
            let g = read(loader, host, lot + 4)?;
            let old = read(loader, host, ext)?;
            let sum = read(loader, host, g)?.wrapping_add(old);
            (write(loader, host, g, sum) && write(loader, host, ext, old.wrapping_neg()))
                .then_some(0)
        }
        _ => None,
    }
}
