// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `pdbscope` crate parses Microsoft PDB (Program Database) files and
//! answers queries over them: symbols by name or address, types by index,
//! name, or member, and section:offset to RVA translation.
//!
//! # Usage
//!
//! PDB files are accessed via the [`PDB`] object. Opening validates the
//! container; everything else is parsed lazily as queries demand it.
//!
//! # Example
//!
//! ```no_run
//! # fn test() -> pdbscope::Result<()> {
//! let pdb = pdbscope::PDB::open_path("fixtures/self/foo.pdb")?;
//!
//! let symbols = pdb.symbols();
//! for symbol in symbols.public()? {
//!     println!(
//!         "{:x}:{:08x} {}",
//!         symbol.section(),
//!         symbol.offset(),
//!         symbol.demangled_name()
//!     );
//! }
//!
//! let types = pdb.types();
//! for member in types.find_members("Point::y")? {
//!     println!("{}::{} at offset {:#x}", member.owner_name, member.name, member.offset);
//! }
//! # Ok(())
//! # }
//! ```

// modules
mod common;
pub mod dbi;
pub mod demangle;
mod msf;
mod pdb;
mod pdbi;
pub mod section;
pub mod source;
pub mod symbol;
mod symbols;
pub mod tpi;
mod types;

// exports
pub use crate::common::{Error, ParseBuffer, RawString, Result, TypeIndex, Variant};
pub use crate::dbi::{DebugInformation, MachineType, Module, ModuleIter};
pub use crate::demangle::{demangle, demangle_lossy, DemangleError};
pub use crate::msf::{StreamReader, SuperBlock, MAGIC, NIL_STREAM_SIZE};
pub use crate::pdb::PDB;
pub use crate::pdbi::PdbInformation;
pub use crate::section::{SectionHeader, SectionHeaders};
pub use crate::source::{SerializedSource, Source};
pub use crate::symbols::{
    AddressHit, AllSymbolsIter, ByNameIter, PublicIter, Symbol, SymbolDetail, SymbolKind,
    SymbolTable,
};
pub use crate::types::{
    ArrayType, BitfieldType, ClassType, EnumType, FunctionType, GenericType, Member,
    MemberFunctionType, MemberMatches, ModifierType, PointerType, PrimitiveType, Type, TypeKind,
    TypeRangeIter, TypeTable, UnionType,
};

// re-export FallibleIterator for convenience
#[doc(no_inline)]
pub use fallible_iterator::FallibleIterator;
