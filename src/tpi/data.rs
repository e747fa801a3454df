// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::constants::*;
use crate::common::*;

/// Encapsulates parsed data about a type record.
///
/// Strings and payloads borrow from the stream buffer; nothing is copied.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeData<'t> {
    /// `LF_CLASS`, `LF_STRUCTURE`, or `LF_INTERFACE`.
    Class {
        kind: ClassKind,
        /// Count of elements in this class.
        count: u16,
        properties: TypeProperties,
        /// The `LF_FIELDLIST` describing the fields, 0 when absent.
        field_list: TypeIndex,
        derived_from: TypeIndex,
        vtable_shape: TypeIndex,
        size: u64,
        name: RawString<'t>,
        /// The decorated name; blank unless `properties.has_unique_name()`.
        unique_name: RawString<'t>,
    },

    Union {
        count: u16,
        properties: TypeProperties,
        field_list: TypeIndex,
        size: u64,
        name: RawString<'t>,
        unique_name: RawString<'t>,
    },

    Enumeration {
        count: u16,
        properties: TypeProperties,
        underlying_type: TypeIndex,
        field_list: TypeIndex,
        name: RawString<'t>,
        unique_name: RawString<'t>,
    },

    Pointer {
        underlying_type: TypeIndex,
        attributes: PointerAttributes,
        /// Present only for pointer-to-member modes.
        containing_class: Option<TypeIndex>,
    },

    Modifier {
        underlying_type: TypeIndex,
        constant: bool,
        volatile: bool,
        unaligned: bool,
    },

    Procedure {
        return_type: TypeIndex,
        attributes: FunctionAttributes,
        parameter_count: u16,
        argument_list: TypeIndex,
    },

    MemberFunction {
        return_type: TypeIndex,
        class_type: TypeIndex,
        this_pointer_type: TypeIndex,
        attributes: FunctionAttributes,
        parameter_count: u16,
        argument_list: TypeIndex,
        this_adjustment: i32,
    },

    Array {
        element_type: TypeIndex,
        indexing_type: TypeIndex,
        /// Total size in bytes, not an element count.
        size: u64,
        name: RawString<'t>,
    },

    Bitfield {
        underlying_type: TypeIndex,
        length: u8,
        position: u8,
    },

    ArgumentList {
        arguments: Vec<TypeIndex>,
    },

    FieldList {
        fields: Vec<TypeData<'t>>,
        /// Set when the list is split across records via `LF_INDEX`.
        continuation: Option<TypeIndex>,
    },

    MethodList {
        methods: Vec<MethodListEntry>,
    },

    // field-list members

    Member {
        attributes: FieldAttributes,
        field_type: TypeIndex,
        offset: u64,
        name: RawString<'t>,
    },

    StaticMember {
        attributes: FieldAttributes,
        field_type: TypeIndex,
        name: RawString<'t>,
    },

    /// `LF_METHOD`: an overloaded method bundle referencing a method list.
    OverloadedMethod {
        count: u16,
        method_list: TypeIndex,
        name: RawString<'t>,
    },

    /// `LF_ONEMETHOD`.
    Method {
        attributes: FieldAttributes,
        method_type: TypeIndex,
        vtable_offset: Option<u32>,
        name: RawString<'t>,
    },

    Nested {
        attributes: FieldAttributes,
        nested_type: TypeIndex,
        name: RawString<'t>,
    },

    BaseClass {
        attributes: FieldAttributes,
        base_class: TypeIndex,
        /// Offset of the base sub-object within the class.
        offset: u64,
    },

    VirtualBaseClass {
        direct: bool,
        attributes: FieldAttributes,
        base_class: TypeIndex,
        base_pointer: TypeIndex,
        base_pointer_offset: u64,
        virtual_base_offset: u64,
    },

    Enumerate {
        attributes: FieldAttributes,
        value: Variant,
        name: RawString<'t>,
    },

    VirtualFunctionTable {
        table: TypeIndex,
    },
}

impl<'t> TypeData<'t> {
    /// Returns the name of this record, if it has one.
    pub fn name(&self) -> Option<RawString<'t>> {
        match *self {
            TypeData::Class { name, .. }
            | TypeData::Union { name, .. }
            | TypeData::Enumeration { name, .. }
            | TypeData::Array { name, .. }
            | TypeData::Member { name, .. }
            | TypeData::StaticMember { name, .. }
            | TypeData::OverloadedMethod { name, .. }
            | TypeData::Method { name, .. }
            | TypeData::Nested { name, .. }
            | TypeData::Enumerate { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Parse a type record (kind tag first) out of a `ParseBuffer`.
pub fn parse_type_data<'t>(buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>> {
    let leaf = buf.parse_u16()?;
    parse_type_payload(leaf, buf)
}

/// Parse a type record whose kind tag has already been stripped.
pub fn parse_type_payload<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>> {
    match leaf {
        LF_CLASS | LF_CLASS_ST | LF_STRUCTURE | LF_STRUCTURE_ST | LF_INTERFACE => {
            let kind = match leaf {
                LF_CLASS | LF_CLASS_ST => ClassKind::Class,
                LF_STRUCTURE | LF_STRUCTURE_ST => ClassKind::Struct,
                _ => ClassKind::Interface,
            };
            let count = buf.parse_u16()?;
            let properties = TypeProperties(buf.parse_u16()?);
            let field_list = TypeIndex(buf.parse_u32()?);
            let derived_from = TypeIndex(buf.parse_u32()?);
            let vtable_shape = TypeIndex(buf.parse_u32()?);
            let size = buf.parse_numeric()?;
            let name = parse_string(leaf, buf)?;
            let unique_name = parse_unique_name(leaf, properties, buf)?;

            Ok(TypeData::Class {
                kind,
                count,
                properties,
                field_list,
                derived_from,
                vtable_shape,
                size,
                name,
                unique_name,
            })
        }

        LF_UNION | LF_UNION_ST => {
            let count = buf.parse_u16()?;
            let properties = TypeProperties(buf.parse_u16()?);
            let field_list = TypeIndex(buf.parse_u32()?);
            let size = buf.parse_numeric()?;
            let name = parse_string(leaf, buf)?;
            let unique_name = parse_unique_name(leaf, properties, buf)?;

            Ok(TypeData::Union {
                count,
                properties,
                field_list,
                size,
                name,
                unique_name,
            })
        }

        LF_ENUM | LF_ENUM_ST => {
            let count = buf.parse_u16()?;
            let properties = TypeProperties(buf.parse_u16()?);
            let underlying_type = TypeIndex(buf.parse_u32()?);
            let field_list = TypeIndex(buf.parse_u32()?);
            let name = parse_string(leaf, buf)?;
            let unique_name = parse_unique_name(leaf, properties, buf)?;

            Ok(TypeData::Enumeration {
                count,
                properties,
                underlying_type,
                field_list,
                name,
                unique_name,
            })
        }

        LF_POINTER => {
            let underlying_type = TypeIndex(buf.parse_u32()?);
            let attributes = PointerAttributes(buf.parse_u32()?);
            let containing_class = if attributes.is_pointer_to_member() {
                Some(TypeIndex(buf.parse_u32()?))
            } else {
                None
            };

            Ok(TypeData::Pointer {
                underlying_type,
                attributes,
                containing_class,
            })
        }

        LF_MODIFIER => {
            let underlying_type = TypeIndex(buf.parse_u32()?);
            let flags = buf.parse_u16()?;

            Ok(TypeData::Modifier {
                underlying_type,
                constant: flags & 0x01 != 0,
                volatile: flags & 0x02 != 0,
                unaligned: flags & 0x04 != 0,
            })
        }

        LF_PROCEDURE => Ok(TypeData::Procedure {
            return_type: TypeIndex(buf.parse_u32()?),
            attributes: FunctionAttributes(buf.parse_u16()?),
            parameter_count: buf.parse_u16()?,
            argument_list: TypeIndex(buf.parse_u32()?),
        }),

        LF_MFUNCTION => Ok(TypeData::MemberFunction {
            return_type: TypeIndex(buf.parse_u32()?),
            class_type: TypeIndex(buf.parse_u32()?),
            this_pointer_type: TypeIndex(buf.parse_u32()?),
            attributes: FunctionAttributes(buf.parse_u16()?),
            parameter_count: buf.parse_u16()?,
            argument_list: TypeIndex(buf.parse_u32()?),
            this_adjustment: buf.parse_i32()?,
        }),

        LF_ARRAY | LF_ARRAY_ST => Ok(TypeData::Array {
            element_type: TypeIndex(buf.parse_u32()?),
            indexing_type: TypeIndex(buf.parse_u32()?),
            size: buf.parse_numeric()?,
            name: parse_string(leaf, buf)?,
        }),

        LF_BITFIELD => Ok(TypeData::Bitfield {
            underlying_type: TypeIndex(buf.parse_u32()?),
            length: buf.parse_u8()?,
            position: buf.parse_u8()?,
        }),

        LF_ARGLIST => {
            let count = buf.parse_u32()?;
            let mut arguments = Vec::with_capacity(count as usize);
            for _ in 0..count {
                arguments.push(TypeIndex(buf.parse_u32()?));
            }
            Ok(TypeData::ArgumentList { arguments })
        }

        LF_FIELDLIST => {
            let mut fields = Vec::new();
            let mut continuation = None;

            while !buf.is_empty() {
                // any byte >= 0xf0 ahead of a member tag is padding
                if buf.peek_u8()? >= 0xf0 {
                    buf.parse_u8()?;
                    continue;
                }

                if buf.peek_u16()? == LF_INDEX {
                    buf.parse_u16()?;
                    buf.parse_u16()?; // padding
                    continuation = Some(TypeIndex(buf.parse_u32()?));
                    continue;
                }

                fields.push(parse_type_data(buf)?);
            }

            Ok(TypeData::FieldList {
                fields,
                continuation,
            })
        }

        LF_METHODLIST => {
            let mut methods = Vec::new();
            while !buf.is_empty() {
                let attributes = FieldAttributes(buf.parse_u16()?);
                buf.parse_u16()?; // padding
                methods.push(MethodListEntry {
                    attributes,
                    method_type: TypeIndex(buf.parse_u32()?),
                    vtable_offset: if attributes.is_intro_virtual() {
                        Some(buf.parse_u32()?)
                    } else {
                        None
                    },
                });
            }
            Ok(TypeData::MethodList { methods })
        }

        LF_MEMBER | LF_MEMBER_ST => Ok(TypeData::Member {
            attributes: FieldAttributes(buf.parse_u16()?),
            field_type: TypeIndex(buf.parse_u32()?),
            offset: buf.parse_numeric()?,
            name: parse_string(leaf, buf)?,
        }),

        LF_STMEMBER | LF_STMEMBER_ST => Ok(TypeData::StaticMember {
            attributes: FieldAttributes(buf.parse_u16()?),
            field_type: TypeIndex(buf.parse_u32()?),
            name: parse_string(leaf, buf)?,
        }),

        LF_METHOD | LF_METHOD_ST => Ok(TypeData::OverloadedMethod {
            count: buf.parse_u16()?,
            method_list: TypeIndex(buf.parse_u32()?),
            name: parse_string(leaf, buf)?,
        }),

        LF_ONEMETHOD | LF_ONEMETHOD_ST => {
            let attributes = FieldAttributes(buf.parse_u16()?);
            Ok(TypeData::Method {
                attributes,
                method_type: TypeIndex(buf.parse_u32()?),
                vtable_offset: if attributes.is_intro_virtual() {
                    // present only for introducing virtuals
                    Some(buf.parse_u32()?)
                } else {
                    None
                },
                name: parse_string(leaf, buf)?,
            })
        }

        LF_NESTTYPE | LF_NESTTYPE_ST | LF_NESTTYPEEX | LF_NESTTYPEEX_ST => {
            let raw_attr = match leaf {
                LF_NESTTYPEEX | LF_NESTTYPEEX_ST => buf.parse_u16()?,
                _ => {
                    buf.parse_u16()?; // padding
                    0
                }
            };

            Ok(TypeData::Nested {
                attributes: FieldAttributes(raw_attr),
                nested_type: TypeIndex(buf.parse_u32()?),
                name: parse_string(leaf, buf)?,
            })
        }

        LF_BCLASS | LF_BINTERFACE => Ok(TypeData::BaseClass {
            attributes: FieldAttributes(buf.parse_u16()?),
            base_class: TypeIndex(buf.parse_u32()?),
            offset: buf.parse_numeric()?,
        }),

        LF_VBCLASS | LF_IVBCLASS => Ok(TypeData::VirtualBaseClass {
            direct: leaf == LF_VBCLASS,
            attributes: FieldAttributes(buf.parse_u16()?),
            base_class: TypeIndex(buf.parse_u32()?),
            base_pointer: TypeIndex(buf.parse_u32()?),
            base_pointer_offset: buf.parse_numeric()?,
            virtual_base_offset: buf.parse_numeric()?,
        }),

        LF_ENUMERATE | LF_ENUMERATE_ST => Ok(TypeData::Enumerate {
            attributes: FieldAttributes(buf.parse_u16()?),
            value: buf.parse_variant()?,
            name: parse_string(leaf, buf)?,
        }),

        LF_VFUNCTAB => {
            buf.parse_u16()?; // padding
            Ok(TypeData::VirtualFunctionTable {
                table: TypeIndex(buf.parse_u32()?),
            })
        }

        _ => Err(Error::UnimplementedRecordKind(leaf)),
    }
}

#[inline]
fn parse_string<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<RawString<'t>> {
    if leaf > LF_ST_MAX {
        buf.parse_cstring()
    } else {
        buf.parse_u8_pascal_string()
    }
}

#[inline]
fn parse_unique_name<'t>(
    leaf: u16,
    properties: TypeProperties,
    buf: &mut ParseBuffer<'t>,
) -> Result<RawString<'t>> {
    if properties.has_unique_name() {
        parse_string(leaf, buf)
    } else {
        Ok(RawString::default())
    }
}

/// Class/struct property bits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TypeProperties(pub u16);

impl TypeProperties {
    /// Packed via `#pragma pack` or similar.
    pub fn packed(self) -> bool {
        self.0 & 0x0001 != 0
    }

    /// Constructors or destructors present.
    pub fn constructors(self) -> bool {
        self.0 & 0x0002 != 0
    }

    /// Overloaded operators present.
    pub fn overloaded_operators(self) -> bool {
        self.0 & 0x0004 != 0
    }

    /// A nested type, e.g. a `union` defined inside a `class`.
    pub fn is_nested_type(self) -> bool {
        self.0 & 0x0008 != 0
    }

    /// Contains nested types.
    pub fn contains_nested_types(self) -> bool {
        self.0 & 0x0010 != 0
    }

    pub fn overloaded_assignment(self) -> bool {
        self.0 & 0x0020 != 0
    }

    pub fn overloaded_casting(self) -> bool {
        self.0 & 0x0040 != 0
    }

    /// An incomplete placeholder record; the defining record appears
    /// elsewhere in the stream.
    pub fn forward_reference(self) -> bool {
        self.0 & 0x0080 != 0
    }

    pub fn scoped_definition(self) -> bool {
        self.0 & 0x0100 != 0
    }

    /// A decorated name follows the regular name.
    pub fn has_unique_name(self) -> bool {
        self.0 & 0x0200 != 0
    }

    pub fn sealed(self) -> bool {
        self.0 & 0x0400 != 0
    }

    pub fn hfa(self) -> u8 {
        ((self.0 >> 11) & 0x03) as u8
    }

    pub fn intrinsic_type(self) -> bool {
        self.0 & 0x2000 != 0
    }

    pub fn mocom(self) -> u8 {
        ((self.0 >> 14) & 0x03) as u8
    }
}

/// Field attribute bits: access protection and method properties.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FieldAttributes(pub u16);

impl FieldAttributes {
    #[inline]
    pub fn access(self) -> Access {
        match self.0 & 0x0003 {
            0x01 => Access::Private,
            0x02 => Access::Protected,
            0x03 => Access::Public,
            _ => Access::None,
        }
    }

    #[inline]
    fn method_properties(self) -> u8 {
        ((self.0 & 0x001c) >> 2) as u8
    }

    #[inline]
    pub fn is_static(self) -> bool {
        self.method_properties() == 0x02
    }

    #[inline]
    pub fn is_virtual(self) -> bool {
        self.method_properties() == 0x01
    }

    #[inline]
    pub fn is_intro_virtual(self) -> bool {
        matches!(self.method_properties(), 0x04 | 0x06)
    }
}

/// Member access protection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    None,
    Private,
    Protected,
    Public,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Access::None => "",
            Access::Private => "private",
            Access::Protected => "protected",
            Access::Public => "public",
        }
    }
}

/// Calling convention and function attribute bits, always found back to
/// back; treated as a combined u16.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FunctionAttributes(pub u16);

impl FunctionAttributes {
    pub fn calling_convention(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn cxx_return_udt(self) -> bool {
        self.0 & 0x0100 != 0
    }

    pub fn is_constructor(self) -> bool {
        self.0 & 0x0200 != 0
    }

    pub fn is_constructor_with_virtual_bases(self) -> bool {
        self.0 & 0x0400 != 0
    }
}

/// Returns the display name of a CodeView calling convention, or `""` for
/// conventions without one.
pub fn calling_convention_name(cc: u8) -> &'static str {
    match cc {
        0x00 | 0x01 => "__cdecl",
        0x02 | 0x03 => "__pascal",
        0x04 | 0x05 => "__fastcall",
        0x07 | 0x08 => "__stdcall",
        0x0b => "__thiscall",
        0x16 => "__clrcall",
        0x18 => "__vectorcall",
        0x19 => "__swift",
        0x1a => "__swiftasync",
        _ => "",
    }
}

/// Pointer attribute bits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PointerAttributes(pub u32);

impl PointerAttributes {
    /// The pointer kind ordinal (near32, near64, based, ...).
    pub fn kind(self) -> u8 {
        (self.0 & 0x1f) as u8
    }

    /// The pointer mode ordinal.
    pub fn mode(self) -> u8 {
        ((self.0 >> 5) & 0x07) as u8
    }

    /// An l-value reference.
    pub fn is_reference(self) -> bool {
        self.mode() == 0x01
    }

    /// An r-value reference.
    pub fn is_rvalue_reference(self) -> bool {
        self.mode() == 0x04
    }

    pub fn is_pointer_to_member(self) -> bool {
        matches!(self.mode(), 0x02 | 0x03)
    }

    pub fn is_volatile(self) -> bool {
        self.0 & 0x200 != 0
    }

    pub fn is_const(self) -> bool {
        self.0 & 0x400 != 0
    }

    pub fn is_unaligned(self) -> bool {
        self.0 & 0x800 != 0
    }

    /// The pointer size in bytes, falling back on the kind ordinal when the
    /// explicit size field is zero.
    pub fn size(self) -> u8 {
        let size = ((self.0 >> 13) & 0x3f) as u8;
        if size != 0 {
            return size;
        }
        match self.kind() {
            0x0a | 0x0b => 4,
            0x0c => 8,
            _ => 0,
        }
    }
}

/// An entry of an `LF_METHODLIST` record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MethodListEntry {
    pub attributes: FieldAttributes,
    pub method_type: TypeIndex,
    pub vtable_offset: Option<u32>,
}

/// Distinguishes the class-like record kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Struct,
    Interface,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u16(v: &mut Vec<u8>, value: u16) {
        v.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(v: &mut Vec<u8>, value: u32) {
        v.extend_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_parse_structure() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_STRUCTURE);
        push_u16(&mut rec, 2); // count
        push_u16(&mut rec, 0); // properties
        push_u32(&mut rec, 0x1001); // field list
        push_u32(&mut rec, 0); // derived from
        push_u32(&mut rec, 0); // vshape
        push_u16(&mut rec, 8); // size, direct numeric
        rec.extend_from_slice(b"Point\0");

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::Class {
                kind: ClassKind::Struct,
                count: 2,
                field_list,
                size: 8,
                name,
                unique_name,
                ..
            } => {
                assert_eq!(field_list, TypeIndex(0x1001));
                assert_eq!(name, RawString::from("Point"));
                // has_unique_name unset: blank unique name
                assert!(unique_name.is_empty());
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_structure_with_unique_name() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_STRUCTURE);
        push_u16(&mut rec, 0);
        push_u16(&mut rec, 0x0200); // has_unique_name
        push_u32(&mut rec, 0);
        push_u32(&mut rec, 0);
        push_u32(&mut rec, 0);
        push_u16(&mut rec, 4);
        rec.extend_from_slice(b"Point\0.?AUPoint@@\0");

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::Class { unique_name, .. } => {
                assert_eq!(unique_name, RawString::from(".?AUPoint@@"));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_field_list_with_padding() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_FIELDLIST);
        // member "x" at offset 0
        push_u16(&mut rec, LF_MEMBER);
        push_u16(&mut rec, 3); // public
        push_u32(&mut rec, 0x74);
        push_u16(&mut rec, 0); // offset
        rec.extend_from_slice(b"x\0");
        // three padding bytes ahead of the next member tag
        rec.extend_from_slice(&[0xf3, 0xf2, 0xf1]);
        // member "y" at offset 4
        push_u16(&mut rec, LF_MEMBER);
        push_u16(&mut rec, 3);
        push_u32(&mut rec, 0x74);
        push_u16(&mut rec, 4);
        rec.extend_from_slice(b"y\0");

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::FieldList {
                fields,
                continuation: None,
            } => {
                assert_eq!(fields.len(), 2);
                match fields[1] {
                    TypeData::Member { offset: 4, name, .. } => {
                        assert_eq!(name, RawString::from("y"))
                    }
                    ref other => panic!("unexpected member: {:?}", other),
                }
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_field_list_continuation() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_FIELDLIST);
        push_u16(&mut rec, LF_INDEX);
        push_u16(&mut rec, 0); // padding
        push_u32(&mut rec, 0x1234);

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::FieldList {
                fields,
                continuation: Some(next),
            } => {
                assert!(fields.is_empty());
                assert_eq!(next, TypeIndex(0x1234));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_enumerate_negative_value() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_ENUMERATE);
        push_u16(&mut rec, 3);
        push_u16(&mut rec, 0x8001); // LF_SHORT
        push_u16(&mut rec, 0xffff); // -1
        rec.extend_from_slice(b"kInvalid\0");

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::Enumerate { value, name, .. } => {
                assert_eq!(value, Variant::I16(-1));
                assert_eq!(name, RawString::from("kInvalid"));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_base_class() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_BCLASS);
        push_u16(&mut rec, 3);
        push_u32(&mut rec, 0x1005);
        push_u16(&mut rec, 0x10); // offset of the base sub-object

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::BaseClass {
                base_class, offset, ..
            } => {
                assert_eq!(base_class, TypeIndex(0x1005));
                assert_eq!(offset, 0x10);
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_pointer() {
        let mut rec = Vec::new();
        push_u16(&mut rec, LF_POINTER);
        push_u32(&mut rec, 0x74);
        // near64, const
        push_u32(&mut rec, 0x0c | 0x400);

        let mut buf = ParseBuffer::from(rec.as_slice());
        match parse_type_data(&mut buf).expect("parse") {
            TypeData::Pointer {
                underlying_type,
                attributes,
                containing_class: None,
            } => {
                assert_eq!(underlying_type, TypeIndex(0x74));
                assert!(attributes.is_const());
                assert_eq!(attributes.size(), 8);
                assert!(!attributes.is_reference());
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }
}
