// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The symbol table: owned symbol values with lazy demangling, and the
//! name- and address-keyed lookups over the symbol-record stream.

use std::sync::OnceLock;

use log::debug;

use crate::common::*;
use crate::dbi::Module;
use crate::demangle;
use crate::pdb::PDB;
use crate::source::Source;
use crate::symbol::index::AddressMatch;
use crate::symbol::{PublicSymbolFlags, SymbolData, SymbolIter};
use crate::FallibleIterator;

/// The category of a [`Symbol`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Public,
    Function,
    Data,
    Udt,
    Constant,
    Local,
    Label,
    Block,
    Thunk,
}

/// Kind-specific fields of a [`Symbol`].
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolDetail {
    Public {
        section: u16,
        offset: u32,
        flags: PublicSymbolFlags,
    },
    Function {
        section: u16,
        offset: u32,
        length: u32,
        type_index: TypeIndex,
        global: bool,
    },
    Data {
        section: u16,
        offset: u32,
        type_index: TypeIndex,
        global: bool,
    },
    Udt {
        type_index: TypeIndex,
    },
    Constant {
        type_index: TypeIndex,
        value: u64,
    },
    Local {
        type_index: TypeIndex,
        is_parameter: bool,
    },
    Label {
        section: u16,
        offset: u32,
    },
    Block {
        section: u16,
        offset: u32,
        length: u32,
    },
    Thunk {
        section: u16,
        offset: u32,
        length: u32,
    },
}

/// A decoded symbol.
///
/// Symbols are owned values: the raw name is copied out of the stream, and
/// the demangled name is computed at most once, on first request.
#[derive(Debug, Clone)]
pub struct Symbol {
    name: String,
    demangled: OnceLock<String>,
    detail: SymbolDetail,
}

impl Symbol {
    /// The raw, possibly mangled name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The demangled name, or the raw name when demangling fails.
    /// Computed once per symbol.
    pub fn demangled_name(&self) -> &str {
        self.demangled
            .get_or_init(|| demangle::demangle_lossy(&self.name))
    }

    /// The symbol's category.
    pub fn kind(&self) -> SymbolKind {
        match self.detail {
            SymbolDetail::Public { .. } => SymbolKind::Public,
            SymbolDetail::Function { .. } => SymbolKind::Function,
            SymbolDetail::Data { .. } => SymbolKind::Data,
            SymbolDetail::Udt { .. } => SymbolKind::Udt,
            SymbolDetail::Constant { .. } => SymbolKind::Constant,
            SymbolDetail::Local { .. } => SymbolKind::Local,
            SymbolDetail::Label { .. } => SymbolKind::Label,
            SymbolDetail::Block { .. } => SymbolKind::Block,
            SymbolDetail::Thunk { .. } => SymbolKind::Thunk,
        }
    }

    /// The 1-based section number, or 0 for symbols without a location.
    pub fn section(&self) -> u16 {
        match self.detail {
            SymbolDetail::Public { section, .. }
            | SymbolDetail::Function { section, .. }
            | SymbolDetail::Data { section, .. }
            | SymbolDetail::Label { section, .. }
            | SymbolDetail::Block { section, .. }
            | SymbolDetail::Thunk { section, .. } => section,
            _ => 0,
        }
    }

    /// The section-relative offset, or 0 for symbols without a location.
    pub fn offset(&self) -> u32 {
        match self.detail {
            SymbolDetail::Public { offset, .. }
            | SymbolDetail::Function { offset, .. }
            | SymbolDetail::Data { offset, .. }
            | SymbolDetail::Label { offset, .. }
            | SymbolDetail::Block { offset, .. }
            | SymbolDetail::Thunk { offset, .. } => offset,
            _ => 0,
        }
    }

    /// The length in bytes for functions, blocks, and thunks; 0 otherwise.
    pub fn length(&self) -> u32 {
        match self.detail {
            SymbolDetail::Function { length, .. }
            | SymbolDetail::Block { length, .. }
            | SymbolDetail::Thunk { length, .. } => length,
            _ => 0,
        }
    }

    /// The referenced type index, for kinds that carry one.
    pub fn type_index(&self) -> Option<TypeIndex> {
        match self.detail {
            SymbolDetail::Function { type_index, .. }
            | SymbolDetail::Data { type_index, .. }
            | SymbolDetail::Udt { type_index }
            | SymbolDetail::Constant { type_index, .. }
            | SymbolDetail::Local { type_index, .. } => Some(type_index),
            _ => None,
        }
    }

    /// The kind-specific fields.
    pub fn detail(&self) -> &SymbolDetail {
        &self.detail
    }

    /// Converts a raw record into an owned symbol, for the record kinds
    /// surfaced by the table.
    pub(crate) fn from_data(data: &SymbolData<'_>) -> Option<Symbol> {
        let (name, detail) = match *data {
            SymbolData::Public {
                flags,
                offset,
                section,
                name,
            } => (
                name,
                SymbolDetail::Public {
                    section,
                    offset,
                    flags,
                },
            ),
            SymbolData::Procedure {
                global,
                length,
                type_index,
                offset,
                section,
                name,
                ..
            } => (
                name,
                SymbolDetail::Function {
                    section,
                    offset,
                    length,
                    type_index,
                    global,
                },
            ),
            SymbolData::Data {
                global,
                type_index,
                offset,
                section,
                name,
                ..
            } => (
                name,
                SymbolDetail::Data {
                    section,
                    offset,
                    type_index,
                    global,
                },
            ),
            SymbolData::UserDefinedType { type_index, name } => {
                (name, SymbolDetail::Udt { type_index })
            }
            SymbolData::Constant {
                type_index,
                value,
                name,
            } => (
                name,
                SymbolDetail::Constant {
                    type_index,
                    value: value.to_u64(),
                },
            ),
            SymbolData::Local {
                type_index,
                flags,
                name,
            } => (
                name,
                SymbolDetail::Local {
                    type_index,
                    is_parameter: flags.is_parameter(),
                },
            ),
            SymbolData::Label {
                offset,
                section,
                name,
                ..
            } => (name, SymbolDetail::Label { section, offset }),
            SymbolData::Block {
                length,
                offset,
                section,
                name,
                ..
            } => (
                name,
                SymbolDetail::Block {
                    section,
                    offset,
                    length,
                },
            ),
            SymbolData::Thunk {
                offset,
                section,
                length,
                name,
                ..
            } => (
                name,
                SymbolDetail::Thunk {
                    section,
                    offset,
                    length: u32::from(length),
                },
            ),
            _ => return None,
        };

        Some(Symbol {
            name: name.to_string().into_owned(),
            demangled: OnceLock::new(),
            detail,
        })
    }
}

/// The result of an address lookup: the containing symbol and whether it
/// starts exactly at the queried address.
#[derive(Debug, Clone)]
pub struct AddressHit {
    pub symbol: Symbol,
    pub exact: bool,
}

/// Provides queries over the symbols of a PDB.
///
/// Obtained from [`PDB::symbols`]. The symbol-record stream, the PSI, and
/// the name and address indices load lazily on first use.
#[derive(Debug)]
pub struct SymbolTable<'p, S> {
    pdb: &'p PDB<S>,
}

impl<'p, S: Source> SymbolTable<'p, S> {
    pub(crate) fn new(pdb: &'p PDB<S>) -> Self {
        SymbolTable { pdb }
    }

    fn record_data(&self) -> Result<&'p [u8]> {
        self.pdb.symbol_record_data()
    }

    /// An iterator over the public symbols, decoded on the fly. Memory use
    /// is bounded by a single record.
    pub fn public(&self) -> Result<PublicIter<'p>> {
        Ok(PublicIter {
            data: self.record_data()?,
            offset: 0,
        })
    }

    /// All public symbols, decoded once and cached: two passes, one to
    /// count and one to fill.
    pub fn public_cached(&self) -> Result<&'p [Symbol]> {
        self.pdb
            .public_cache
            .get_or_init(|| {
                let data = self.record_data()?;

                let count = PublicIter { data, offset: 0 }.count();
                let mut symbols = Vec::with_capacity(count);
                symbols.extend(PublicIter { data, offset: 0 });

                debug!("cached {} public symbols", symbols.len());
                Ok(symbols)
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Error::clone)
    }

    /// Counts the public symbols without caching them.
    pub fn public_count(&self) -> Result<usize> {
        if let Some(Ok(cached)) = self.pdb.public_cache.get() {
            return Ok(cached.len());
        }

        let data = self.record_data()?;
        let mut count = 0;
        let mut offset = 0;
        while let Ok((record, next)) = SymbolIter::record_at(data, offset) {
            if record.raw_kind() == crate::symbol::constants::S_PUB32 {
                count += 1;
            }
            offset = next;
        }
        Ok(count)
    }

    /// Finds the first symbol with the given raw name, through the name
    /// index.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Symbol>> {
        Ok(self.by_name(name)?.next())
    }

    /// Returns an iterator over every symbol whose raw name equals `name`,
    /// walking the hash bucket.
    pub fn by_name(&self, name: &str) -> Result<ByNameIter<'p>> {
        let index = self.pdb.name_index()?;
        Ok(ByNameIter {
            data: self.record_data()?,
            offsets: index.find(name.as_bytes()).into_iter(),
        })
    }

    /// Finds the public symbol containing `(section, offset)` via binary
    /// search over the address index. `exact` is set when the symbol starts
    /// at the queried address.
    pub fn find_by_address(&self, section: u16, offset: u32) -> Result<Option<AddressHit>> {
        let index = self.pdb.address_index()?;

        let AddressMatch { sym_offset, exact } = match index.find(section, offset) {
            Some(hit) => hit,
            None => return Ok(None),
        };

        let data = self.record_data()?;
        let symbol = crate::symbol::index::record_at(data, sym_offset)
            .ok()
            .and_then(|record| record.parse().ok())
            .and_then(|parsed| Symbol::from_data(&parsed));

        Ok(symbol.map(|symbol| AddressHit { symbol, exact }))
    }

    /// An iterator over every symbol: publics first, then each module's
    /// records (functions, data, UDTs, constants, locals, labels, blocks,
    /// thunks).
    pub fn all(&self) -> Result<AllSymbolsIter<'p, S>> {
        let publics = self.public()?;
        let modules = match self.pdb.debug_information() {
            Ok(dbi) => dbi.modules().collect()?,
            Err(_) => Vec::new(),
        };

        Ok(AllSymbolsIter {
            pdb: self.pdb,
            publics,
            modules: modules.into_iter(),
            current: None,
        })
    }
}

/// Streaming iterator over `S_PUB32` records; see [`SymbolTable::public`].
#[derive(Debug)]
pub struct PublicIter<'p> {
    data: &'p [u8],
    offset: usize,
}

impl Iterator for PublicIter<'_> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        while let Ok((record, next)) = SymbolIter::record_at(self.data, self.offset) {
            self.offset = next;
            if record.raw_kind() != crate::symbol::constants::S_PUB32 {
                continue;
            }
            if let Some(symbol) = record.parse().ok().and_then(|p| Symbol::from_data(&p)) {
                return Some(symbol);
            }
        }
        None
    }
}

/// Iterator over same-named symbols; see [`SymbolTable::by_name`].
#[derive(Debug)]
pub struct ByNameIter<'p> {
    data: &'p [u8],
    offsets: std::vec::IntoIter<u32>,
}

impl Iterator for ByNameIter<'_> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        for offset in self.offsets.by_ref() {
            let symbol = crate::symbol::index::record_at(self.data, offset)
                .ok()
                .and_then(|record| record.parse().ok())
                .and_then(|parsed| Symbol::from_data(&parsed));
            if let Some(symbol) = symbol {
                return Some(symbol);
            }
        }
        None
    }
}

/// Iterator over all symbols; see [`SymbolTable::all`].
pub struct AllSymbolsIter<'p, S> {
    pdb: &'p PDB<S>,
    publics: PublicIter<'p>,
    modules: std::vec::IntoIter<Module>,
    current: Option<ModuleSymbols>,
}

#[derive(Debug)]
struct ModuleSymbols {
    data: Vec<u8>,
    offset: usize,
}

impl<S: Source> Iterator for AllSymbolsIter<'_, S> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        if let Some(symbol) = self.publics.next() {
            return Some(symbol);
        }

        loop {
            if let Some(ref mut current) = self.current {
                while let Ok((record, next)) = SymbolIter::record_at(&current.data, current.offset)
                {
                    current.offset = next;
                    if let Some(symbol) =
                        record.parse().ok().and_then(|p| Symbol::from_data(&p))
                    {
                        return Some(symbol);
                    }
                }
                self.current = None;
            }

            let module = self.modules.next()?;
            match self.pdb.module_symbol_data(&module) {
                Ok(Some(data)) => {
                    self.current = Some(ModuleSymbols { data, offset: 0 });
                }
                Ok(None) | Err(_) => continue,
            }
        }
    }
}

impl<S> std::fmt::Debug for AllSymbolsIter<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllSymbolsIter")
    }
}

pub(crate) fn module_symbol_slice(data: &[u8], symbols_size: u32) -> Option<&[u8]> {
    // the stream opens with a 4-byte signature; the symbol area is
    // sym_byte_size - 4 from there
    if data.len() < 4 || symbols_size < 4 {
        return None;
    }
    let body = &data[4..];
    let take = ((symbols_size - 4) as usize).min(body.len());
    Some(&body[..take])
}
