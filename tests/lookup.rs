mod common;

use common::{FLASH_BASE, externs_module, fib_module, loader, named_module, resolve_host};
use mlink::{
    LoadMode,
    arch::{LotPrologue, PROLOGUE_LEN, ThumbPrologue},
    format::{ModuleBuilder, ModuleImage, SymbolKind, SymbolLocation},
};
use rstest::rstest;

const ACCESSOR: u32 = 0x0800_4321;

fn word_at(code: &[u8], offset: u32) -> u32 {
    let offset = offset as usize;
    u32::from_ne_bytes(code[offset..offset + 4].try_into().unwrap())
}

#[rstest]
fn modules_by_name() {
    let a = named_module("alpha", 1);
    let b = named_module("beta", 2);
    let mut loader = loader(4);
    let ha = loader
        .load(ModuleImage::new(FLASH_BASE, &a), None, LoadMode::CopyCode)
        .unwrap();
    let hb = loader
        .load(ModuleImage::new(FLASH_BASE + 0x100, &b), None, LoadMode::CopyCode)
        .unwrap();

    assert_eq!(loader.find_module("alpha"), Some(ha));
    assert_eq!(loader.find_module("beta"), Some(hb));
    assert_eq!(loader.find_module("gamma"), None);
    assert_eq!(loader.find_module("alph"), None);
    assert_eq!(loader.module_name(hb), Some("beta"));

    let names: Vec<_> = loader.modules().map(|(_, module)| module.name()).collect();
    assert_eq!(names, ["alpha", "beta"]);
}

#[rstest]
fn symbol_scope() {
    let a = named_module("alpha", 1);
    let b = named_module("beta", 2);
    let mut loader = loader(4);
    let ha = loader
        .load(ModuleImage::new(FLASH_BASE, &a), None, LoadMode::CopyAll)
        .unwrap();
    let hb = loader
        .load(ModuleImage::new(FLASH_BASE + 0x100, &b), None, LoadMode::ExecuteInPlace)
        .unwrap();

    let global = loader.find_symbol(None, "payload").unwrap();
    let in_a = loader.find_symbol(Some(ha), "payload").unwrap();
    let in_b = loader.find_symbol(Some(hb), "payload").unwrap();
    assert_eq!(global, in_a);
    assert_ne!(in_a.value, in_b.value);
    assert_eq!(in_b.kind, SymbolKind::Exported);
    assert_eq!(in_b.value, loader.module(hb).unwrap().data_addr());
    assert_eq!(loader.read_u32(in_a.value), Some(1));
    assert_eq!(loader.read_u32(in_b.value), Some(2));

    assert_eq!(loader.find_symbol(Some(ha), "missing"), None);
    assert_eq!(loader.symbol_value(None, "missing"), 0);

    let in_b_value = in_b.value;
    loader.unload(ha).unwrap();
    assert_eq!(loader.symbol_value(None, "payload"), in_b_value);
}

#[rstest]
fn extern_references_are_not_definitions() {
    let bytes = externs_module();
    let mut loader = loader(1).with_resolver(resolve_host);
    let handle = loader
        .load(ModuleImage::new(FLASH_BASE, &bytes), None, LoadMode::CopyCode)
        .unwrap();
    assert_eq!(loader.find_symbol(Some(handle), "ext_i"), None);
    assert_ne!(loader.symbol_value(Some(handle), "g"), 0);
}

#[rstest]
#[case(LoadMode::CopyAll)]
#[case(LoadMode::CopyCode)]
fn patch_thumb_prologues(#[case] mode: LoadMode) {
    let bytes = fib_module();
    let mut loader = loader(1);
    let handle = loader
        .load(ModuleImage::new(FLASH_BASE, &bytes), None, mode)
        .unwrap();

    assert_eq!(
        loader.patch_exported_functions(Some(handle), &ThumbPrologue, ACCESSOR),
        2
    );
    let module = loader.module(handle).unwrap();
    let code = module.code();
    assert_eq!(word_at(code, PROLOGUE_LEN), ACCESSOR);
    assert_eq!(word_at(code, 0x20 + PROLOGUE_LEN), ACCESSOR);
    // Entry points themselves are left alone.
    assert_eq!(word_at(code, 0), common::OP_FIB_REC);
    assert_eq!(word_at(code, 0x20), common::OP_FIB_TABLE);
    // The source image is never written.
    assert_eq!(&bytes[..], &fib_module()[..]);
}

#[rstest]
fn execute_in_place_is_not_patched() {
    let bytes = fib_module();
    let mut loader = loader(1);
    let handle = loader
        .load(ModuleImage::new(FLASH_BASE, &bytes), None, LoadMode::ExecuteInPlace)
        .unwrap();
    assert_eq!(loader.patch_exported_functions(None, &ThumbPrologue, ACCESSOR), 0);
    // Code stays in the image: 64 bytes of code followed by 48 of data.
    let code_end = bytes.len() - 48;
    assert_eq!(loader.module(handle).unwrap().code(), &bytes[code_end - 64..code_end]);
}

#[rstest]
fn patch_skips_entries_outside_code() {
    let mut builder = ModuleBuilder::new("short");
    builder.code(&[0; 24]);
    builder.exported("fits", SymbolLocation::Code, 0);
    builder.exported("overruns", SymbolLocation::Code, 8);
    builder.exported("variable", SymbolLocation::Data, 0);
    let bytes = builder.build().unwrap();

    let mut loader = loader(2);
    let handle = loader
        .load(ModuleImage::new(FLASH_BASE, &bytes), None, LoadMode::CopyCode)
        .unwrap();
    assert_eq!(loader.patch_exported_functions(None, &ThumbPrologue, ACCESSOR), 1);
    assert_eq!(word_at(loader.module(handle).unwrap().code(), 18), ACCESSOR);
}

/// A prologue whose accessor word sits right after a two-instruction stub.
struct ShortPrologue;

impl LotPrologue for ShortPrologue {
    fn offset(&self) -> u32 {
        4
    }
}

#[rstest]
fn custom_prologue() {
    let a = named_module("alpha", 1);
    let bytes = fib_module();
    let mut loader = loader(2);
    let ha = loader
        .load(ModuleImage::new(FLASH_BASE, &a), None, LoadMode::CopyCode)
        .unwrap();
    let hf = loader
        .load(ModuleImage::new(FLASH_BASE + 0x100, &bytes), None, LoadMode::CopyCode)
        .unwrap();

    assert_eq!(loader.patch_exported_functions(Some(ha), &ShortPrologue, ACCESSOR), 0);
    let prologue: &dyn LotPrologue = &ShortPrologue;
    assert_eq!(loader.patch_exported_functions(None, prologue, ACCESSOR), 2);
    let code = loader.module(hf).unwrap().code();
    assert_eq!(word_at(code, 4), ACCESSOR);
    assert_eq!(word_at(code, 0x24), ACCESSOR);
}

#[rstest]
#[case(LoadMode::CopyAll)]
#[case(LoadMode::CopyCode)]
#[case(LoadMode::ExecuteInPlace)]
fn lot_base_from_program_counter(#[case] mode: LoadMode) {
    let a = named_module("alpha", 1);
    let bytes = fib_module();
    let mut loader = loader(2);
    loader
        .load(ModuleImage::new(FLASH_BASE + 0x1000, &a), None, mode)
        .unwrap();
    let handle = loader
        .load(ModuleImage::new(FLASH_BASE, &bytes), None, mode)
        .unwrap();
    let module = loader.module(handle).unwrap();
    let start = module.code_addr();
    let end = start + module.header().code_size;

    assert_eq!(loader.lot_base_for_pc(start), module.ram_base());
    assert_eq!(loader.lot_base_for_pc(start + 0x21), module.ram_base());
    assert_eq!(loader.lot_base_for_pc(end - 1), module.ram_base());
    assert_eq!(loader.lot_base_for_pc(end), 0);
    assert_eq!(loader.lot_base_for_pc(start - 1), 0);
    assert_eq!(loader.lot_base_for_pc(0), 0);
}
