use super::{HostResolver, RelocationTarget, Relocations};
use crate::{
    DebugLevel, Error, Result,
    format::{Layout, ModuleHeader, SymbolKind, SymbolLocation, SymbolTable, write_u32},
};

/// Everything the engine needs to relocate one module.
pub(crate) struct RelocationContext<'m, 'r, R: ?Sized> {
    pub(crate) header: &'m ModuleHeader,
    pub(crate) layout: &'m Layout,
    /// Header, relocations and symbol table, wherever they live.
    pub(crate) metadata: &'m [u8],
    pub(crate) symbols: SymbolTable<'m>,
    pub(crate) lot: &'r mut [u8],
    /// `.data` followed by `.bss`.
    pub(crate) data: &'r mut [u8],
    pub(crate) resolver: &'m R,
    pub(crate) level: DebugLevel,
}

/// Applies every relocation in table order.
///
/// Stops at the first failing entry; the caller rolls the load back.
pub(crate) fn relocate<R>(ctx: RelocationContext<'_, '_, R>) -> Result<()>
where
    R: HostResolver + ?Sized,
{
    let RelocationContext {
        header,
        layout,
        metadata,
        symbols,
        lot,
        data,
        resolver,
        level,
    } = ctx;
    diag!(
        level,
        Info,
        "LOT base: {:#010x}, .data starts at {:#010x}, .code starts at {:#010x}",
        layout.ram_base(),
        layout.data_addr(),
        layout.code_addr()
    );

    for rel in Relocations::new(metadata, header) {
        let symbol = match symbols.get(rel.symbol_index) {
            Ok(Some(symbol)) => symbol,
            _ => {
                diag!(
                    level,
                    Error,
                    "relocation references missing symbol index {}",
                    rel.symbol_index
                );
                return Err(Error::BadRelocationTable);
            }
        };
        let name = symbol.name.unwrap_or("(N/A)");
        let value = match symbol.kind {
            SymbolKind::Local | SymbolKind::Exported => {
                let rebased = symbol.rebase(layout);
                diag!(
                    level,
                    Info,
                    "applying relocation for symbol {} ({}) relative to {} at lot_offset={}: {:#010x} -> {:#010x}",
                    rel.symbol_index,
                    name,
                    match symbol.location {
                        SymbolLocation::Code => "code",
                        SymbolLocation::Data => "data",
                    },
                    rel.lot_offset,
                    symbol.value,
                    rebased.value
                );
                rebased.value
            }
            SymbolKind::Extern => {
                diag!(
                    level,
                    Info,
                    "applying extern relocation for symbol {} ({}) at lot_offset={}",
                    rel.symbol_index,
                    name,
                    rel.lot_offset
                );
                match resolver.resolve(name) {
                    Some(addr) if addr != 0 => addr,
                    _ => {
                        diag!(
                            level,
                            Error,
                            "unable to resolve relocation for extern symbol '{}'",
                            name
                        );
                        return Err(Error::UnknownSymbol);
                    }
                }
            }
            SymbolKind::Name => {
                diag!(level, Error, "relocation against the module name symbol");
                return Err(Error::BadRelocationTable);
            }
        };

        let target = rel.target(header.lot_entry_count);
        let section: &mut [u8] = match target {
            RelocationTarget::Lot(_) => &mut *lot,
            RelocationTarget::Data(_) => &mut *data,
        };
        target
            .byte_offset()
            .and_then(|offset| write_u32(section, offset, value))
            .ok_or_else(|| {
                diag!(
                    level,
                    Error,
                    "relocation target {:?} is outside the module",
                    target
                );
                Error::BadRelocationTable
            })?;
    }
    Ok(())
}
