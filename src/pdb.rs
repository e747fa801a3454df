// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};

use log::debug;

use crate::common::*;
use crate::dbi::{DebugInformation, Module, INVALID_STREAM_INDEX};
use crate::msf::{Msf, StreamReader, STREAM_DBI, STREAM_IPI, STREAM_PDB_INFO, STREAM_TPI};
use crate::pdbi::PdbInformation;
use crate::section::SectionHeaders;
use crate::source::Source;
use crate::symbol::index::{AddressIndex, NameIndex, Psi};
use crate::symbols::{self, SymbolTable};
use crate::tpi::TypeInformation;
use crate::types::{MemberIndex, Type, TypeTable};

/// An opened PDB file.
///
/// `PDB` owns the underlying byte source and every structure derived from
/// it. Opening validates only the superblock; the directory, the well-known
/// streams, and the query indices all load lazily, at most once each, with
/// the first outcome (value or error) cached for every later caller. All
/// accessors take `&self`, so a `PDB` can be shared across threads whenever
/// its source can.
#[derive(Debug)]
pub struct PDB<S> {
    msf: Msf<S>,

    pub(crate) info: OnceLock<Result<PdbInformation>>,
    pub(crate) dbi: OnceLock<Result<DebugInformation>>,
    pub(crate) tpi: OnceLock<Result<TypeInformation>>,
    pub(crate) ipi: OnceLock<Result<TypeInformation>>,

    pub(crate) sym_records: OnceLock<Result<Vec<u8>>>,
    pub(crate) psi: OnceLock<Result<Psi>>,
    pub(crate) name_index_cell: OnceLock<Result<NameIndex>>,
    pub(crate) addr_index_cell: OnceLock<Result<AddressIndex>>,
    pub(crate) public_cache: OnceLock<Result<Vec<crate::symbols::Symbol>>>,

    pub(crate) sections: OnceLock<Result<SectionHeaders>>,

    pub(crate) type_cache: RwLock<HashMap<u32, Type>>,
    pub(crate) type_name_index: OnceLock<Result<HashMap<String, Vec<TypeIndex>>>>,
    pub(crate) member_index: OnceLock<Result<MemberIndex>>,
}

impl PDB<std::fs::File> {
    /// Opens a PDB from a filesystem path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::open(file)
    }
}

impl<S: Source> PDB<S> {
    /// Opens a PDB from a byte source, validating the MSF superblock.
    ///
    /// Container-level failures (bad magic, bad block size, truncated file)
    /// are fatal; nothing else is read until first use.
    pub fn open(source: S) -> Result<Self> {
        let msf = Msf::open(source)?;
        debug!(
            "opened PDB: block size {}, {} blocks",
            msf.superblock().block_size,
            msf.superblock().num_blocks
        );

        Ok(PDB {
            msf,
            info: OnceLock::new(),
            dbi: OnceLock::new(),
            tpi: OnceLock::new(),
            ipi: OnceLock::new(),
            sym_records: OnceLock::new(),
            psi: OnceLock::new(),
            name_index_cell: OnceLock::new(),
            addr_index_cell: OnceLock::new(),
            public_cache: OnceLock::new(),
            sections: OnceLock::new(),
            type_cache: RwLock::new(HashMap::new()),
            type_name_index: OnceLock::new(),
            member_index: OnceLock::new(),
        })
    }

    /// The container's block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.msf.block_size()
    }

    /// The number of streams in the container, nil streams included.
    pub fn num_streams(&self) -> Result<u32> {
        Ok(self.msf.directory()?.num_streams())
    }

    /// The size of a stream in bytes, or 0 for nil or out-of-range streams.
    pub fn stream_size(&self, index: u32) -> Result<u32> {
        Ok(self.msf.directory()?.stream_size(index))
    }

    /// Whether the stream exists and is neither nil nor empty.
    pub fn stream_exists(&self, index: u32) -> Result<bool> {
        Ok(self.msf.directory()?.stream_exists(index))
    }

    /// Opens a raw stream reader. Works even when the typed decoders fail,
    /// so damaged substreams never block raw access.
    pub fn raw_stream(&self, index: u32) -> Result<StreamReader<'_, S>> {
        self.msf.open_stream(index)
    }

    /// Metadata from the PDB-info stream: version, signature, age, GUID.
    pub fn info(&self) -> Result<&PdbInformation> {
        self.info
            .get_or_init(|| {
                let data = self.msf.read_stream(STREAM_PDB_INFO)?;
                PdbInformation::parse(&data)
            })
            .as_ref()
            .map_err(Error::clone)
    }

    /// The parsed TPI stream.
    pub fn type_information(&self) -> Result<&TypeInformation> {
        self.tpi
            .get_or_init(|| TypeInformation::parse(self.msf.read_stream(STREAM_TPI)?))
            .as_ref()
            .map_err(Error::clone)
    }

    /// The parsed IPI stream, which shares the TPI record framing.
    pub fn id_information(&self) -> Result<&TypeInformation> {
        self.ipi
            .get_or_init(|| TypeInformation::parse(self.msf.read_stream(STREAM_IPI)?))
            .as_ref()
            .map_err(Error::clone)
    }

    /// The parsed DBI stream.
    pub fn debug_information(&self) -> Result<&DebugInformation> {
        self.dbi
            .get_or_init(|| {
                let data = self.msf.read_stream(STREAM_DBI)?;
                DebugInformation::parse(&data)
            })
            .as_ref()
            .map_err(Error::clone)
    }

    /// The modules (compilands) listed in the DBI.
    pub fn modules(&self) -> Result<Vec<Module>> {
        use crate::FallibleIterator;
        self.debug_information()?.modules().collect()
    }

    /// The symbols of a single module's stream, in record order.
    pub fn module_symbols(&self, module: &Module) -> Result<Vec<crate::symbols::Symbol>> {
        let data = match self.module_symbol_data(module)? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        let mut result = Vec::new();
        let mut offset = 0usize;
        while let Ok((record, next)) = crate::symbol::SymbolIter::record_at(&data, offset) {
            offset = next;
            if let Some(symbol) = record
                .parse()
                .ok()
                .and_then(|parsed| crate::symbols::Symbol::from_data(&parsed))
            {
                result.push(symbol);
            }
        }
        Ok(result)
    }

    /// The PE section headers from the optional-debug-header stream.
    pub fn sections(&self) -> Result<&SectionHeaders> {
        self.sections
            .get_or_init(|| {
                let dbi = self.debug_information()?;
                let stream = dbi.optional_debug_header().section_header_stream_index;
                if stream == INVALID_STREAM_INDEX {
                    return Err(Error::SectionHeadersNotFound);
                }
                let data = self.msf.read_stream(u32::from(stream))?;
                SectionHeaders::parse(&data)
            })
            .as_ref()
            .map_err(Error::clone)
    }

    /// The type table for this PDB.
    pub fn types(&self) -> TypeTable<'_, S> {
        TypeTable::new(self)
    }

    /// The symbol table for this PDB.
    pub fn symbols(&self) -> SymbolTable<'_, S> {
        SymbolTable::new(self)
    }

    // ---- shared lazy state ----------------------------------------------

    /// The raw bytes of the symbol-record stream named by the DBI header.
    pub(crate) fn symbol_record_data(&self) -> Result<&[u8]> {
        self.sym_records
            .get_or_init(|| {
                let dbi = self.debug_information()?;
                let stream = dbi.header().sym_record_stream_index;
                if stream == INVALID_STREAM_INDEX {
                    return Ok(Vec::new());
                }
                self.msf.read_stream(u32::from(stream))
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Error::clone)
    }

    /// The parsed public symbol index.
    pub(crate) fn public_symbol_index(&self) -> Result<&Psi> {
        self.psi
            .get_or_init(|| {
                let dbi = self.debug_information()?;
                let stream = dbi.header().public_stream_index;
                if stream == INVALID_STREAM_INDEX {
                    return Err(Error::StreamNotFound(u32::from(stream)));
                }
                let data = self.msf.read_stream(u32::from(stream))?;
                Psi::parse(&data)
            })
            .as_ref()
            .map_err(Error::clone)
    }

    /// The name index over the symbol-record stream, built on first use.
    pub(crate) fn name_index(&self) -> Result<&NameIndex> {
        self.name_index_cell
            .get_or_init(|| Ok(NameIndex::build(self.symbol_record_data()?)))
            .as_ref()
            .map_err(Error::clone)
    }

    /// The address index over the PSI address map, built on first use.
    pub(crate) fn address_index(&self) -> Result<&AddressIndex> {
        self.addr_index_cell
            .get_or_init(|| {
                let data = self.symbol_record_data()?;
                let psi = self.public_symbol_index()?;
                Ok(AddressIndex::build(psi.address_map(), data))
            })
            .as_ref()
            .map_err(Error::clone)
    }

    /// Reads a module's symbol area: the module stream minus its 4-byte
    /// signature, truncated to the declared symbol size. `None` when the
    /// module has no stream.
    pub(crate) fn module_symbol_data(&self, module: &Module) -> Result<Option<Vec<u8>>> {
        if module.stream == INVALID_STREAM_INDEX {
            return Ok(None);
        }

        let data = self.msf.read_stream(u32::from(module.stream))?;
        Ok(symbols::module_symbol_slice(&data, module.symbols_size).map(|sym| sym.to_vec()))
    }
}
