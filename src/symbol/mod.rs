// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Raw CodeView symbol records.
//!
//! The symbol-record stream (and each module's symbol substream) is a flat
//! sequence of records framed by a 16-bit length and a 16-bit kind. The
//! length field is authoritative: iteration advances by it even when a
//! payload fails to decode, so one malformed record cannot desynchronize
//! the stream.

use std::fmt;
use std::result;

use crate::common::*;
use crate::FallibleIterator;

pub(crate) mod constants;
pub(crate) mod index;

use self::constants::*;

/// A raw symbol record: its bytes, kind tag included, length prefix
/// excluded.
///
/// `SymbolRecord`s borrow from the stream buffer and may not outlive it.
#[derive(Copy, Clone, PartialEq)]
pub struct SymbolRecord<'t>(pub(crate) &'t [u8]);

impl<'t> SymbolRecord<'t> {
    /// The record's kind tag.
    #[inline]
    pub fn raw_kind(&self) -> u16 {
        debug_assert!(self.0.len() >= 2);
        u16::from(self.0[0]) | (u16::from(self.0[1]) << 8)
    }

    /// The record bytes, kind tag included.
    pub fn raw_bytes(&self) -> &'t [u8] {
        self.0
    }

    /// Parses the record into the [`SymbolData`] it contains.
    #[inline]
    pub fn parse(&self) -> Result<SymbolData<'t>> {
        let mut buf = ParseBuffer::from(&self.0[2..]);
        parse_symbol_data(self.raw_kind(), &mut buf)
    }

    /// Returns the raw name carried by this record, or `None` for kinds
    /// that carry none (or that this library does not decode).
    pub fn name(&self) -> Option<RawString<'t>> {
        self.parse().ok().and_then(|data| data.name())
    }
}

impl fmt::Debug for SymbolRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SymbolRecord{{ kind: 0x{:04x} [{} bytes] }}",
            self.raw_kind(),
            self.0.len()
        )
    }
}

// CV_PUBSYMFLAGS_e
const CVPSF_CODE: u32 = 0x0000_0001;
const CVPSF_FUNCTION: u32 = 0x0000_0002;
const CVPSF_MANAGED: u32 = 0x0000_0004;
const CVPSF_MSIL: u32 = 0x0000_0008;

/// Attribute bits of an `S_PUB32` record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PublicSymbolFlags(pub u32);

impl PublicSymbolFlags {
    pub fn is_code(self) -> bool {
        self.0 & CVPSF_CODE != 0
    }

    pub fn is_function(self) -> bool {
        self.0 & CVPSF_FUNCTION != 0
    }

    pub fn is_managed(self) -> bool {
        self.0 & CVPSF_MANAGED != 0
    }

    pub fn is_msil(self) -> bool {
        self.0 & CVPSF_MSIL != 0
    }
}

/// Attribute bits of a procedure record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProcedureFlags(pub u8);

impl ProcedureFlags {
    pub fn has_frame_pointer(self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn is_noreturn(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn is_noinline(self) -> bool {
        self.0 & 0x40 != 0
    }
}

/// Attribute bits of an `S_LOCAL` record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LocalFlags(pub u16);

impl LocalFlags {
    pub fn is_parameter(self) -> bool {
        self.0 & 0x0001 != 0
    }

    pub fn is_compiler_generated(self) -> bool {
        self.0 & 0x0004 != 0
    }

    pub fn is_optimized_out(self) -> bool {
        self.0 & 0x0100 != 0
    }
}

/// `SymbolData` contains the information parsed from a symbol record.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolData<'t> {
    /// `S_PUB32`: a public symbol with a mangled name.
    Public {
        flags: PublicSymbolFlags,
        offset: u32,
        section: u16,
        name: RawString<'t>,
    },

    /// `S_GPROC32`, `S_LPROC32`, and their `_ID` variants.
    Procedure {
        global: bool,
        parent: u32,
        end: u32,
        next: u32,
        length: u32,
        dbg_start_offset: u32,
        dbg_end_offset: u32,
        type_index: TypeIndex,
        offset: u32,
        section: u16,
        flags: ProcedureFlags,
        name: RawString<'t>,
    },

    /// `S_GDATA32`, `S_LDATA32`, and the thread-storage variants.
    Data {
        global: bool,
        thread_storage: bool,
        type_index: TypeIndex,
        offset: u32,
        section: u16,
        name: RawString<'t>,
    },

    /// `S_UDT`: a user-defined-type reference.
    UserDefinedType {
        type_index: TypeIndex,
        name: RawString<'t>,
    },

    /// `S_CONSTANT`.
    Constant {
        type_index: TypeIndex,
        value: Variant,
        name: RawString<'t>,
    },

    /// `S_LOCAL`.
    Local {
        type_index: TypeIndex,
        flags: LocalFlags,
        name: RawString<'t>,
    },

    /// `S_LABEL32`.
    Label {
        offset: u32,
        section: u16,
        flags: u8,
        name: RawString<'t>,
    },

    /// `S_BLOCK32`.
    Block {
        parent: u32,
        end: u32,
        length: u32,
        offset: u32,
        section: u16,
        name: RawString<'t>,
    },

    /// `S_THUNK32`.
    Thunk {
        parent: u32,
        end: u32,
        next: u32,
        offset: u32,
        section: u16,
        length: u16,
        ordinal: u8,
        name: RawString<'t>,
    },

    /// `S_PROCREF`, `S_LPROCREF`, `S_DATAREF`: references into a module's
    /// symbol stream.
    Reference {
        sum_name: u32,
        symbol_offset: u32,
        module: u16,
        name: RawString<'t>,
    },

    /// `S_OBJNAME`.
    ObjectName {
        signature: u32,
        name: RawString<'t>,
    },

    /// `S_COMPILE3`.
    Compile {
        flags: u32,
        machine: u16,
        frontend_version: [u16; 4],
        backend_version: [u16; 4],
        version: RawString<'t>,
    },

    /// `S_REGREL32`.
    RegisterRelative {
        offset: u32,
        type_index: TypeIndex,
        register: u16,
        name: RawString<'t>,
    },

    /// `S_BPREL32`.
    BasePointerRelative {
        offset: i32,
        type_index: TypeIndex,
        name: RawString<'t>,
    },

    /// `S_FRAMEPROC`.
    FrameProcedure {
        frame_size: u32,
        padding_size: u32,
        padding_offset: u32,
        callee_save_size: u32,
        exception_handler_offset: i32,
        exception_handler_section: u16,
        flags: u32,
    },

    /// `S_SECTION`.
    Section {
        section: u16,
        alignment: u8,
        rva: u32,
        length: u32,
        characteristics: u32,
        name: RawString<'t>,
    },

    /// `S_COFFGROUP`.
    CoffGroup {
        length: u32,
        characteristics: u32,
        offset: u32,
        section: u16,
        name: RawString<'t>,
    },

    /// `S_EXPORT`.
    Export {
        ordinal: u16,
        flags: u16,
        name: RawString<'t>,
    },

    /// `S_TRAMPOLINE`.
    Trampoline {
        kind: u16,
        size: u16,
        thunk_offset: u32,
        target_offset: u32,
        thunk_section: u16,
        target_section: u16,
    },
}

impl<'t> SymbolData<'t> {
    /// Returns the raw name of this symbol, if it has one.
    pub fn name(&self) -> Option<RawString<'t>> {
        match *self {
            SymbolData::Public { name, .. }
            | SymbolData::Procedure { name, .. }
            | SymbolData::Data { name, .. }
            | SymbolData::UserDefinedType { name, .. }
            | SymbolData::Constant { name, .. }
            | SymbolData::Local { name, .. }
            | SymbolData::Label { name, .. }
            | SymbolData::Block { name, .. }
            | SymbolData::Thunk { name, .. }
            | SymbolData::Reference { name, .. }
            | SymbolData::ObjectName { name, .. }
            | SymbolData::Section { name, .. }
            | SymbolData::CoffGroup { name, .. }
            | SymbolData::Export { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn parse_symbol_data<'t>(kind: u16, buf: &mut ParseBuffer<'t>) -> Result<SymbolData<'t>> {
    match kind {
        S_PUB32 | S_PUB32_ST => Ok(SymbolData::Public {
            flags: PublicSymbolFlags(buf.parse_u32()?),
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_GPROC32 | S_LPROC32 | S_GPROC32_ID | S_LPROC32_ID | S_GPROC32_ST | S_LPROC32_ST => {
            Ok(SymbolData::Procedure {
                global: matches!(kind, S_GPROC32 | S_GPROC32_ID | S_GPROC32_ST),
                parent: buf.parse_u32()?,
                end: buf.parse_u32()?,
                next: buf.parse_u32()?,
                length: buf.parse_u32()?,
                dbg_start_offset: buf.parse_u32()?,
                dbg_end_offset: buf.parse_u32()?,
                type_index: TypeIndex(buf.parse_u32()?),
                offset: buf.parse_u32()?,
                section: buf.parse_u16()?,
                flags: ProcedureFlags(buf.parse_u8()?),
                name: parse_name(kind, buf)?,
            })
        }

        S_GDATA32 | S_LDATA32 | S_GDATA32_ST | S_LDATA32_ST | S_GTHREAD32 | S_LTHREAD32
        | S_GTHREAD32_ST | S_LTHREAD32_ST => Ok(SymbolData::Data {
            global: matches!(kind, S_GDATA32 | S_GDATA32_ST | S_GTHREAD32 | S_GTHREAD32_ST),
            thread_storage: matches!(
                kind,
                S_GTHREAD32 | S_LTHREAD32 | S_GTHREAD32_ST | S_LTHREAD32_ST
            ),
            type_index: TypeIndex(buf.parse_u32()?),
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_UDT | S_UDT_ST => Ok(SymbolData::UserDefinedType {
            type_index: TypeIndex(buf.parse_u32()?),
            name: parse_name(kind, buf)?,
        }),

        S_CONSTANT | S_CONSTANT_ST => Ok(SymbolData::Constant {
            type_index: TypeIndex(buf.parse_u32()?),
            value: buf.parse_variant()?,
            name: parse_name(kind, buf)?,
        }),

        S_LOCAL => Ok(SymbolData::Local {
            type_index: TypeIndex(buf.parse_u32()?),
            flags: LocalFlags(buf.parse_u16()?),
            name: parse_name(kind, buf)?,
        }),

        S_LABEL32 => Ok(SymbolData::Label {
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            flags: buf.parse_u8()?,
            name: parse_name(kind, buf)?,
        }),

        S_BLOCK32 => Ok(SymbolData::Block {
            parent: buf.parse_u32()?,
            end: buf.parse_u32()?,
            length: buf.parse_u32()?,
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_THUNK32 => Ok(SymbolData::Thunk {
            parent: buf.parse_u32()?,
            end: buf.parse_u32()?,
            next: buf.parse_u32()?,
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            length: buf.parse_u16()?,
            ordinal: buf.parse_u8()?,
            name: parse_name(kind, buf)?,
        }),

        S_PROCREF | S_LPROCREF | S_DATAREF | S_PROCREF_ST | S_LPROCREF_ST | S_DATAREF_ST => {
            Ok(SymbolData::Reference {
                sum_name: buf.parse_u32()?,
                symbol_offset: buf.parse_u32()?,
                module: buf.parse_u16()?,
                name: parse_name(kind, buf)?,
            })
        }

        S_OBJNAME | S_OBJNAME_ST => Ok(SymbolData::ObjectName {
            signature: buf.parse_u32()?,
            name: parse_name(kind, buf)?,
        }),

        S_COMPILE3 => Ok(SymbolData::Compile {
            flags: buf.parse_u32()?,
            machine: buf.parse_u16()?,
            frontend_version: [
                buf.parse_u16()?,
                buf.parse_u16()?,
                buf.parse_u16()?,
                buf.parse_u16()?,
            ],
            backend_version: [
                buf.parse_u16()?,
                buf.parse_u16()?,
                buf.parse_u16()?,
                buf.parse_u16()?,
            ],
            version: parse_name(kind, buf)?,
        }),

        S_REGREL32 => Ok(SymbolData::RegisterRelative {
            offset: buf.parse_u32()?,
            type_index: TypeIndex(buf.parse_u32()?),
            register: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_BPREL32 => Ok(SymbolData::BasePointerRelative {
            offset: buf.parse_i32()?,
            type_index: TypeIndex(buf.parse_u32()?),
            name: parse_name(kind, buf)?,
        }),

        S_FRAMEPROC => {
            let frame_size = buf.parse_u32()?;
            let padding_size = buf.parse_u32()?;
            let padding_offset = buf.parse_u32()?;
            let callee_save_size = buf.parse_u32()?;
            let exception_handler_offset = buf.parse_i32()?;
            let exception_handler_section = buf.parse_u16()?;
            buf.parse_u16()?; // padding
            Ok(SymbolData::FrameProcedure {
                frame_size,
                padding_size,
                padding_offset,
                callee_save_size,
                exception_handler_offset,
                exception_handler_section,
                flags: buf.parse_u32()?,
            })
        }

        S_SECTION => {
            let section = buf.parse_u16()?;
            let alignment = buf.parse_u8()?;
            buf.parse_u8()?; // reserved
            Ok(SymbolData::Section {
                section,
                alignment,
                rva: buf.parse_u32()?,
                length: buf.parse_u32()?,
                characteristics: buf.parse_u32()?,
                name: parse_name(kind, buf)?,
            })
        }

        S_COFFGROUP => Ok(SymbolData::CoffGroup {
            length: buf.parse_u32()?,
            characteristics: buf.parse_u32()?,
            offset: buf.parse_u32()?,
            section: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_EXPORT => Ok(SymbolData::Export {
            ordinal: buf.parse_u16()?,
            flags: buf.parse_u16()?,
            name: parse_name(kind, buf)?,
        }),

        S_TRAMPOLINE => Ok(SymbolData::Trampoline {
            kind: buf.parse_u16()?,
            size: buf.parse_u16()?,
            thunk_offset: buf.parse_u32()?,
            target_offset: buf.parse_u32()?,
            thunk_section: buf.parse_u16()?,
            target_section: buf.parse_u16()?,
        }),

        _ => Err(Error::UnimplementedRecordKind(kind)),
    }
}

#[inline]
fn parse_name<'t>(kind: u16, buf: &mut ParseBuffer<'t>) -> Result<RawString<'t>> {
    if kind < S_ST_MAX {
        buf.parse_u8_pascal_string()
    } else {
        buf.parse_cstring()
    }
}

/// A `SymbolIter` iterates over a symbol-record area, producing raw
/// [`SymbolRecord`]s.
///
/// The cursor advances by each record's length field, never by the amount a
/// payload parser consumed.
#[derive(Debug)]
pub struct SymbolIter<'t> {
    buf: ParseBuffer<'t>,
}

impl<'t> SymbolIter<'t> {
    pub(crate) fn new(data: &'t [u8]) -> Self {
        SymbolIter {
            buf: ParseBuffer::from(data),
        }
    }

    /// Parses the record at `offset` in `data`, returning it together with
    /// the offset of the following record.
    pub(crate) fn record_at(data: &'t [u8], offset: usize) -> Result<(SymbolRecord<'t>, usize)> {
        if offset >= data.len() {
            return Err(Error::UnexpectedEof);
        }
        let mut buf = ParseBuffer::from(&data[offset..]);
        let length = buf.parse_u16()? as usize;
        if length < 2 {
            return Err(Error::InvalidRecord);
        }
        let record = SymbolRecord(buf.take(length)?);
        Ok((record, offset + length + 2))
    }
}

impl<'t> FallibleIterator for SymbolIter<'t> {
    type Item = SymbolRecord<'t>;
    type Error = Error;

    fn next(&mut self) -> result::Result<Option<Self::Item>, Self::Error> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let length = self.buf.parse_u16()? as usize;
        if length < 2 {
            return Err(Error::InvalidRecord);
        }

        Ok(Some(SymbolRecord(self.buf.take(length)?)))
    }
}

#[cfg(test)]
mod tests {
    mod parsing {
        use crate::common::*;
        use crate::symbol::*;

        fn parse(buf: &[u8]) -> Result<(SymbolRecord<'_>, SymbolData<'_>, String)> {
            let record = SymbolRecord(buf);
            let data = record.parse()?;
            let name = data.name().unwrap_or_default().to_string().into_owned();
            Ok((record, data, name))
        }

        #[test]
        fn kind_110e() {
            let buf = &[
                14, 17, 2, 0, 0, 0, 192, 85, 0, 0, 1, 0, 95, 95, 108, 111, 99, 97, 108, 95, 115,
                116, 100, 105, 111, 95, 112, 114, 105, 110, 116, 102, 95, 111, 112, 116, 105, 111,
                110, 115, 0, 0,
            ];
            let (record, data, name) = parse(buf).expect("parse");
            assert_eq!(record.raw_kind(), 0x110e);
            assert_eq!(
                data,
                SymbolData::Public {
                    flags: PublicSymbolFlags(2),
                    offset: 21952,
                    section: 1,
                    name: RawString::from("__local_stdio_printf_options"),
                }
            );
            assert!(matches!(
                data,
                SymbolData::Public { flags, .. } if flags.is_function() && !flags.is_code()
            ));
            assert_eq!(name, "__local_stdio_printf_options");
        }

        #[test]
        fn kind_1108() {
            let buf = &[8, 17, 112, 6, 0, 0, 118, 97, 95, 108, 105, 115, 116, 0];
            let (record, data, name) = parse(buf).expect("parse");
            assert_eq!(record.raw_kind(), 0x1108);
            assert!(matches!(
                data,
                SymbolData::UserDefinedType { type_index: TypeIndex(1648), .. }
            ));
            assert_eq!(name, "va_list");
        }

        #[test]
        fn kind_1107() {
            let buf = &[
                7, 17, 201, 18, 0, 0, 1, 0, 95, 95, 73, 83, 65, 95, 65, 86, 65, 73, 76, 65, 66, 76,
                69, 95, 83, 83, 69, 50, 0, 0,
            ];
            let (record, data, name) = parse(buf).expect("parse");
            assert_eq!(record.raw_kind(), 0x1107);
            assert!(matches!(
                data,
                SymbolData::Constant {
                    type_index: TypeIndex(4809),
                    value: Variant::U16(1),
                    ..
                }
            ));
            assert_eq!(name, "__ISA_AVAILABLE_SSE2");
        }

        #[test]
        fn kind_110d() {
            let buf = &[
                13, 17, 116, 0, 0, 0, 16, 0, 0, 0, 3, 0, 95, 95, 105, 115, 97, 95, 97, 118, 97,
                105, 108, 97, 98, 108, 101, 0, 0, 0,
            ];
            let (record, data, name) = parse(buf).expect("parse");
            assert_eq!(record.raw_kind(), 0x110d);
            assert_eq!(
                data,
                SymbolData::Data {
                    global: true,
                    thread_storage: false,
                    type_index: TypeIndex(116),
                    offset: 16,
                    section: 3,
                    name: RawString::from("__isa_available"),
                }
            );
            assert_eq!(name, "__isa_available");
        }

        #[test]
        fn kind_1125() {
            let buf = &[
                37, 17, 0, 0, 0, 0, 108, 0, 0, 0, 1, 0, 66, 97, 122, 58, 58, 102, 95, 112, 117, 98,
                108, 105, 99, 0,
            ];
            let (record, data, name) = parse(buf).expect("parse");
            assert_eq!(record.raw_kind(), 0x1125);
            assert!(matches!(
                data,
                SymbolData::Reference {
                    sum_name: 0,
                    symbol_offset: 108,
                    module: 1,
                    ..
                }
            ));
            assert_eq!(name, "Baz::f_public");
        }
    }

    mod iteration {
        use crate::symbol::*;
        use crate::FallibleIterator;

        fn pub32(name: &str, section: u16, offset: u32) -> Vec<u8> {
            let mut payload = Vec::new();
            payload.extend_from_slice(&constants::S_PUB32.to_le_bytes());
            payload.extend_from_slice(&2u32.to_le_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&section.to_le_bytes());
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);

            let mut rec = Vec::new();
            rec.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            rec.extend_from_slice(&payload);
            rec
        }

        #[test]
        fn test_iterates_and_recovers_from_bad_payloads() {
            let mut data = pub32("one", 1, 0x10);
            // a record with an unknown kind and junk payload, framed fine
            data.extend_from_slice(&6u16.to_le_bytes());
            data.extend_from_slice(&[0xff, 0xef, 1, 2, 3, 4]);
            data.extend_from_slice(&pub32("two", 1, 0x20));

            let mut iter = SymbolIter::new(&data);
            let mut names = Vec::new();
            let mut failures = 0;
            while let Some(record) = iter.next().expect("frame") {
                match record.parse() {
                    Ok(sym) => names.push(sym.name().unwrap().to_string().into_owned()),
                    Err(_) => failures += 1,
                }
            }

            assert_eq!(names, vec!["one", "two"]);
            assert_eq!(failures, 1);
        }

        #[test]
        fn test_record_at() {
            let first = pub32("alpha", 1, 0);
            let mut data = first.clone();
            data.extend_from_slice(&pub32("beta", 1, 8));

            let (record, next) = SymbolIter::record_at(&data, 0).expect("record");
            assert_eq!(record.name().unwrap().as_bytes(), b"alpha");
            assert_eq!(next, first.len());

            let (record, _) = SymbolIter::record_at(&data, next).expect("record");
            assert_eq!(record.name().unwrap().as_bytes(), b"beta");
        }
    }
}
