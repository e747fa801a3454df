// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Simple ("primitive") type indices.
//!
//! Indices below 0x1000 are self-describing: the low byte selects a
//! primitive kind and bits 8..12 select a pointer mode. Nothing is stored in
//! the stream for them; this module synthesizes their name and size.

use crate::common::TypeIndex;

// pointer modes (bits 8..12 of a simple index)
pub const MODE_DIRECT: u8 = 0x00;
pub const MODE_NEAR16: u8 = 0x01;
pub const MODE_FAR16: u8 = 0x02;
pub const MODE_HUGE16: u8 = 0x03;
pub const MODE_NEAR32: u8 = 0x04;
pub const MODE_FAR32: u8 = 0x05;
pub const MODE_NEAR64: u8 = 0x06;
pub const MODE_NEAR128: u8 = 0x07;

/// The synthesized description of a simple type index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimpleTypeInfo {
    /// The C name of the underlying primitive.
    pub name: &'static str,
    /// Size in bytes: the primitive's own size, or the pointer width when
    /// the mode is not direct.
    pub size: u64,
    /// True when the mode applies pointer indirection.
    pub is_pointer: bool,
}

/// Describes a simple type index, or `None` if the kind byte is unknown.
///
/// Unknown kinds still describe as `"unknown"` when the caller wants a
/// best-effort value; only out-of-range inputs return `None`.
pub fn simple_type_info(index: TypeIndex) -> Option<SimpleTypeInfo> {
    if !index.is_simple() {
        return None;
    }

    let (name, mut size) = match index.simple_kind() {
        0x00 => ("<no type>", 0),
        0x03 => ("void", 0),
        0x08 => ("HRESULT", 4),

        0x10 => ("signed char", 1),
        0x20 => ("unsigned char", 1),
        0x68 => ("int8_t", 1),
        0x69 => ("uint8_t", 1),

        0x70 => ("char", 1),
        0x71 => ("wchar_t", 2),
        0x7a => ("char16_t", 2),
        0x7b => ("char32_t", 4),
        0x7c => ("char8_t", 1),

        0x11 => ("short", 2),
        0x21 => ("unsigned short", 2),
        0x72 => ("short", 2),
        0x73 => ("unsigned short", 2),

        0x12 => ("long", 4),
        0x22 => ("unsigned long", 4),
        0x74 => ("int", 4),
        0x75 => ("unsigned int", 4),

        0x13 => ("int64_t", 8),
        0x23 => ("uint64_t", 8),
        0x76 => ("int64_t", 8),
        0x77 => ("uint64_t", 8),

        0x14 => ("__int128", 16),
        0x24 => ("unsigned __int128", 16),
        0x78 => ("__int128", 16),
        0x79 => ("unsigned __int128", 16),

        0x46 => ("_Float16", 2),
        0x40 => ("float", 4),
        0x45 => ("float", 4),
        0x44 => ("float", 6),
        0x41 => ("double", 8),
        0x42 => ("long double", 10),
        0x43 => ("__float128", 16),

        0x30 => ("bool", 1),
        0x31 => ("bool16", 2),
        0x32 => ("bool32", 4),
        0x33 => ("bool64", 8),

        _ => ("unknown", 0),
    };

    let mode = index.simple_mode();
    let is_pointer = mode != MODE_DIRECT;
    if is_pointer {
        size = match mode {
            MODE_NEAR16 | MODE_FAR16 | MODE_HUGE16 | MODE_NEAR32 | MODE_FAR32 => 4,
            MODE_NEAR64 => 8,
            MODE_NEAR128 => 16,
            _ => size,
        };
    }

    Some(SimpleTypeInfo {
        name,
        size,
        is_pointer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_direct() {
        let info = simple_type_info(TypeIndex(0x0074)).expect("int");
        assert_eq!(info.name, "int");
        assert_eq!(info.size, 4);
        assert!(!info.is_pointer);
    }

    #[test]
    fn test_int32_near64_pointer() {
        let info = simple_type_info(TypeIndex(0x0674)).expect("int*");
        assert_eq!(info.name, "int");
        assert_eq!(info.size, 8);
        assert!(info.is_pointer);
    }

    #[test]
    fn test_near128_pointer() {
        let info = simple_type_info(TypeIndex(0x0703)).expect("void*");
        assert_eq!(info.size, 16);
        assert!(info.is_pointer);
    }

    #[test]
    fn test_void_and_hresult() {
        assert_eq!(simple_type_info(TypeIndex(0x0003)).unwrap().name, "void");
        let hr = simple_type_info(TypeIndex(0x0008)).unwrap();
        assert_eq!(hr.name, "HRESULT");
        assert_eq!(hr.size, 4);
    }

    #[test]
    fn test_user_index_is_not_simple() {
        assert_eq!(simple_type_info(TypeIndex(0x1000)), None);
    }
}
