// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(dead_code, non_upper_case_globals)]

// Type record kinds (LF_*). The _ST variants carry pre-Unicode
// length-prefixed strings; everything at or above LF_ST_MAX uses
// NUL-terminated strings.

pub const LF_MODIFIER_16t: u16 = 0x0001;
pub const LF_POINTER_16t: u16 = 0x0002;
pub const LF_VTSHAPE: u16 = 0x000a;
pub const LF_LABEL: u16 = 0x000e;
pub const LF_NULL: u16 = 0x000f;
pub const LF_NOTTRAN: u16 = 0x0010;

pub const LF_MODIFIER: u16 = 0x1001;
pub const LF_POINTER: u16 = 0x1002;
pub const LF_ARRAY_ST: u16 = 0x1003;
pub const LF_CLASS_ST: u16 = 0x1004;
pub const LF_STRUCTURE_ST: u16 = 0x1005;
pub const LF_UNION_ST: u16 = 0x1006;
pub const LF_ENUM_ST: u16 = 0x1007;
pub const LF_PROCEDURE: u16 = 0x1008;
pub const LF_MFUNCTION: u16 = 0x1009;
pub const LF_COBOL0: u16 = 0x100a;
pub const LF_BARRAY: u16 = 0x100c;
pub const LF_DIMARRAY_ST: u16 = 0x1016;
pub const LF_VFTPATH: u16 = 0x1017;
pub const LF_PRECOMP_ST: u16 = 0x1018;
pub const LF_OEM: u16 = 0x1019;
pub const LF_ALIAS_ST: u16 = 0x101a;
pub const LF_OEM2: u16 = 0x101b;

pub const LF_SKIP: u16 = 0x1200;
pub const LF_ARGLIST: u16 = 0x1201;
pub const LF_DEFARG_ST: u16 = 0x1202;
pub const LF_FIELDLIST: u16 = 0x1203;
pub const LF_DERIVED: u16 = 0x1204;
pub const LF_BITFIELD: u16 = 0x1205;
pub const LF_METHODLIST: u16 = 0x1206;
pub const LF_DIMCONU: u16 = 0x1207;
pub const LF_DIMCONLU: u16 = 0x1208;
pub const LF_DIMVARU: u16 = 0x1209;
pub const LF_DIMVARLU: u16 = 0x120a;
pub const LF_REFSYM: u16 = 0x020c;

// field-list member leaves

pub const LF_BCLASS: u16 = 0x1400;
pub const LF_VBCLASS: u16 = 0x1401;
pub const LF_IVBCLASS: u16 = 0x1402;
pub const LF_ENUMERATE_ST: u16 = 0x0403;
pub const LF_FRIENDFCN_ST: u16 = 0x1403;
pub const LF_INDEX: u16 = 0x1404;
pub const LF_MEMBER_ST: u16 = 0x1405;
pub const LF_STMEMBER_ST: u16 = 0x1406;
pub const LF_METHOD_ST: u16 = 0x1407;
pub const LF_NESTTYPE_ST: u16 = 0x1408;
pub const LF_VFUNCTAB: u16 = 0x1409;
pub const LF_FRIENDCLS: u16 = 0x140a;
pub const LF_ONEMETHOD_ST: u16 = 0x140b;
pub const LF_VFUNCOFF: u16 = 0x140c;
pub const LF_NESTTYPEEX_ST: u16 = 0x140d;

// records at or above this value carry NUL-terminated strings
pub const LF_ST_MAX: u16 = 0x1500;

pub const LF_TYPESERVER: u16 = 0x1501;
pub const LF_ENUMERATE: u16 = 0x1502;
pub const LF_ARRAY: u16 = 0x1503;
pub const LF_CLASS: u16 = 0x1504;
pub const LF_STRUCTURE: u16 = 0x1505;
pub const LF_UNION: u16 = 0x1506;
pub const LF_ENUM: u16 = 0x1507;
pub const LF_DIMARRAY: u16 = 0x1508;
pub const LF_PRECOMP: u16 = 0x1509;
pub const LF_ALIAS: u16 = 0x150a;
pub const LF_DEFARG: u16 = 0x150b;
pub const LF_FRIENDFCN: u16 = 0x150c;
pub const LF_MEMBER: u16 = 0x150d;
pub const LF_STMEMBER: u16 = 0x150e;
pub const LF_METHOD: u16 = 0x150f;
pub const LF_NESTTYPE: u16 = 0x1510;
pub const LF_ONEMETHOD: u16 = 0x1511;
pub const LF_NESTTYPEEX: u16 = 0x1512;
pub const LF_MEMBERMODIFY: u16 = 0x1513;
pub const LF_MANAGED: u16 = 0x1514;
pub const LF_TYPESERVER2: u16 = 0x1515;

pub const LF_STRIDED_ARRAY: u16 = 0x1516;
pub const LF_HLSL: u16 = 0x1517;
pub const LF_MODIFIER_EX: u16 = 0x1518;
pub const LF_INTERFACE: u16 = 0x1519;
pub const LF_BINTERFACE: u16 = 0x151a;
pub const LF_VECTOR: u16 = 0x151b;
pub const LF_MATRIX: u16 = 0x151c;
pub const LF_VFTABLE: u16 = 0x151d;

// ID records, stored in the IPI stream with the same framing

pub const LF_FUNC_ID: u16 = 0x1601;
pub const LF_MFUNC_ID: u16 = 0x1602;
pub const LF_BUILDINFO: u16 = 0x1603;
pub const LF_SUBSTR_LIST: u16 = 0x1604;
pub const LF_STRING_ID: u16 = 0x1605;
pub const LF_UDT_SRC_LINE: u16 = 0x1606;
pub const LF_UDT_MOD_SRC_LINE: u16 = 0x1607;

// Bytes 0xf0..=0xff ahead of a member leaf are alignment padding; the low
// nibble is the pad count but skipping byte-by-byte is equivalent.
pub const LF_PAD0: u16 = 0x00f0;
pub const LF_PAD15: u16 = 0x00ff;
