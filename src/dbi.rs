// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

// DBI = "Debug Information"

use std::fmt;
use std::result;

use crate::common::*;
use crate::FallibleIterator;

/// A stream index of `0xffff` marks an absent stream.
pub const INVALID_STREAM_INDEX: u16 = 0xffff;

const HEADER_SIZE: usize = 64;

/// Versions seen in the DBI header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeaderVersion {
    V41,
    V50,
    V60,
    V70,
    V110,
    OtherValue(u32),
}

impl From<u32> for HeaderVersion {
    fn from(v: u32) -> Self {
        match v {
            930803 => HeaderVersion::V41,
            19960307 => HeaderVersion::V50,
            19970606 => HeaderVersion::V60,
            19990903 => HeaderVersion::V70,
            20091201 => HeaderVersion::V110,
            _ => HeaderVersion::OtherValue(v),
        }
    }
}

/// The 64-byte DBI header. The version signature is always -1; everything
/// else describes the stream indices and substream sizes that follow.
#[derive(Debug, Copy, Clone)]
pub struct Header {
    pub signature: i32,
    pub version: HeaderVersion,
    pub age: u32,
    /// Stream index of the global symbol index (GSI).
    pub global_stream_index: u16,
    pub build_number: u16,
    /// Stream index of the public symbol index (PSI).
    pub public_stream_index: u16,
    pub pdb_dll_version: u16,
    /// Stream index of the deduplicated symbol-record stream.
    pub sym_record_stream_index: u16,
    pub pdb_dll_rbld: u16,
    pub module_info_size: u32,
    pub section_contribution_size: u32,
    pub section_map_size: u32,
    pub source_info_size: u32,
    pub type_server_map_size: u32,
    pub mfc_type_server_index: u32,
    pub optional_dbg_header_size: u32,
    pub ec_substream_size: u32,
    pub flags: u16,
    pub machine_type: u16,
    pub reserved: u32,
}

impl Header {
    fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        let header = Header {
            signature: buf.parse_i32()?,
            version: HeaderVersion::from(buf.parse_u32()?),
            age: buf.parse_u32()?,
            global_stream_index: buf.parse_u16()?,
            build_number: buf.parse_u16()?,
            public_stream_index: buf.parse_u16()?,
            pdb_dll_version: buf.parse_u16()?,
            sym_record_stream_index: buf.parse_u16()?,
            pdb_dll_rbld: buf.parse_u16()?,
            module_info_size: buf.parse_u32()?,
            section_contribution_size: buf.parse_u32()?,
            section_map_size: buf.parse_u32()?,
            source_info_size: buf.parse_u32()?,
            type_server_map_size: buf.parse_u32()?,
            mfc_type_server_index: buf.parse_u32()?,
            optional_dbg_header_size: buf.parse_u32()?,
            ec_substream_size: buf.parse_u32()?,
            flags: buf.parse_u16()?,
            machine_type: buf.parse_u16()?,
            reserved: buf.parse_u32()?,
        };

        if header.signature != -1 {
            // an ancient DBIHdr rather than a NewDBIHdr
            return Err(Error::UnsupportedVersion(header.signature as u32));
        }

        Ok(header)
    }

    /// True if the image was linked incrementally.
    pub fn is_incrementally_linked(&self) -> bool {
        self.flags & 0x01 != 0
    }

    /// True if private symbol data was stripped.
    pub fn is_stripped(&self) -> bool {
        self.flags & 0x02 != 0
    }

    /// True if the PDB carries conflicting types.
    pub fn has_conflicting_types(&self) -> bool {
        self.flags & 0x04 != 0
    }
}

/// The target machine's architecture.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MachineType {
    Invalid,
    Unknown,
    Am33,
    Amd64,
    Arm,
    Arm64,
    ArmNT,
    Ebc,
    X86,
    Ia64,
    M32R,
    Mips16,
    MipsFpu,
    MipsFpu16,
    PowerPC,
    PowerPCFP,
    R4000,
    SH3,
    SH3DSP,
    SH4,
    SH5,
    Thumb,
    WceMipsV2,
}

impl From<u16> for MachineType {
    fn from(value: u16) -> Self {
        match value {
            0xffff => MachineType::Invalid,
            0x0 => MachineType::Unknown,
            0x13 => MachineType::Am33,
            0x8664 => MachineType::Amd64,
            0x1c0 => MachineType::Arm,
            0xaa64 => MachineType::Arm64,
            0x1c4 => MachineType::ArmNT,
            0xebc => MachineType::Ebc,
            0x14c => MachineType::X86,
            0x200 => MachineType::Ia64,
            0x9041 => MachineType::M32R,
            0x266 => MachineType::Mips16,
            0x366 => MachineType::MipsFpu,
            0x466 => MachineType::MipsFpu16,
            0x1f0 => MachineType::PowerPC,
            0x1f1 => MachineType::PowerPCFP,
            0x166 => MachineType::R4000,
            0x1a2 => MachineType::SH3,
            0x1a3 => MachineType::SH3DSP,
            0x1a6 => MachineType::SH4,
            0x1a8 => MachineType::SH5,
            0x1c2 => MachineType::Thumb,
            0x169 => MachineType::WceMipsV2,
            _ => MachineType::Unknown,
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A module's contribution to a PE section, as recorded in the DBI.
#[derive(Debug, Copy, Clone)]
pub struct SectionContribution {
    pub section: u16,
    pub offset: i32,
    pub size: i32,
    pub characteristics: u32,
    pub module: u16,
    pub data_crc: u32,
    pub reloc_crc: u32,
}

impl SectionContribution {
    fn parse(buf: &mut ParseBuffer<'_>, with_crc: bool) -> Result<Self> {
        let section = buf.parse_u16()?;
        buf.parse_u16()?; // padding
        let offset = buf.parse_i32()?;
        let size = buf.parse_i32()?;
        let characteristics = buf.parse_u32()?;
        let module = buf.parse_u16()?;
        buf.parse_u16()?; // padding

        let (data_crc, reloc_crc) = if with_crc {
            (buf.parse_u32()?, buf.parse_u32()?)
        } else {
            (0, 0)
        };

        Ok(SectionContribution {
            section,
            offset,
            size,
            characteristics,
            module,
            data_crc,
            reloc_crc,
        })
    }
}

// Section-contribution substream version tags. Both carry the CRC pair.
const SECTION_CONTRIB_V60: u32 = 0xf131_51f5;
const SECTION_CONTRIB_V2: u32 = 0xf12e_ba2d;

/// A per-compiland record from the module-info substream.
#[derive(Debug, Clone)]
pub struct Module {
    /// The module's first section contribution.
    pub contribution: SectionContribution,
    pub flags: u16,
    /// Stream holding this module's symbols and line info, or
    /// [`INVALID_STREAM_INDEX`].
    pub stream: u16,
    /// Size of symbol data in that stream, including the 4-byte signature.
    pub symbols_size: u32,
    pub c11_lines_size: u32,
    pub c13_lines_size: u32,
    pub files: u16,
    pub source_file_name_index: u32,
    pub pdb_file_path_name_index: u32,
    /// Usually a full path to an object file, or `Import:<dll>`.
    pub module_name: String,
    /// Same as `module_name` for plain objects; the archive path for
    /// members of static libraries.
    pub object_file_name: String,
}

/// A `ModuleIter` iterates over the module-info substream, producing
/// [`Module`]s.
#[derive(Debug)]
pub struct ModuleIter<'m> {
    buf: ParseBuffer<'m>,
}

impl FallibleIterator for ModuleIter<'_> {
    type Item = Module;
    type Error = Error;

    fn next(&mut self) -> result::Result<Option<Self::Item>, Self::Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let buf = &mut self.buf;
        buf.parse_u32()?; // pmod, unused
        let contribution = SectionContribution::parse(buf, true)?;
        let flags = buf.parse_u16()?;
        let stream = buf.parse_u16()?;
        let symbols_size = buf.parse_u32()?;
        let c11_lines_size = buf.parse_u32()?;
        let c13_lines_size = buf.parse_u32()?;
        let files = buf.parse_u16()?;
        buf.parse_u16()?; // padding
        buf.parse_u32()?; // file name offsets, unused
        let source_file_name_index = buf.parse_u32()?;
        let pdb_file_path_name_index = buf.parse_u32()?;
        let module_name = buf.parse_cstring()?.to_string().into_owned();
        let object_file_name = buf.parse_cstring()?.to_string().into_owned();
        buf.align(4)?;

        Ok(Some(Module {
            contribution,
            flags,
            stream,
            symbols_size,
            c11_lines_size,
            c13_lines_size,
            files,
            source_file_name_index,
            pdb_file_path_name_index,
            module_name,
            object_file_name,
        }))
    }
}

/// A logical-segment descriptor from the section-map substream.
#[derive(Debug, Copy, Clone)]
pub struct SectionMapEntry {
    pub flags: u16,
    pub overlay: u16,
    pub group: u16,
    pub frame: u16,
    pub section_name: u16,
    pub class_name: u16,
    pub offset: u32,
    pub section_length: u32,
}

/// Stream indices of the optional debug streams appended to the DBI.
/// Absent entries stay at [`INVALID_STREAM_INDEX`].
#[derive(Debug, Copy, Clone)]
pub struct OptionalDebugHeader {
    pub fpo_stream_index: u16,
    pub exception_stream_index: u16,
    pub fixup_stream_index: u16,
    pub omap_to_src_stream_index: u16,
    pub omap_from_src_stream_index: u16,
    /// The stream of PE `IMAGE_SECTION_HEADER`s used for section:offset to
    /// RVA translation.
    pub section_header_stream_index: u16,
    pub token_rid_map_stream_index: u16,
    pub xdata_stream_index: u16,
    pub pdata_stream_index: u16,
    pub new_fpo_stream_index: u16,
    pub original_section_header_stream_index: u16,
}

impl Default for OptionalDebugHeader {
    fn default() -> Self {
        OptionalDebugHeader {
            fpo_stream_index: INVALID_STREAM_INDEX,
            exception_stream_index: INVALID_STREAM_INDEX,
            fixup_stream_index: INVALID_STREAM_INDEX,
            omap_to_src_stream_index: INVALID_STREAM_INDEX,
            omap_from_src_stream_index: INVALID_STREAM_INDEX,
            section_header_stream_index: INVALID_STREAM_INDEX,
            token_rid_map_stream_index: INVALID_STREAM_INDEX,
            xdata_stream_index: INVALID_STREAM_INDEX,
            pdata_stream_index: INVALID_STREAM_INDEX,
            new_fpo_stream_index: INVALID_STREAM_INDEX,
            original_section_header_stream_index: INVALID_STREAM_INDEX,
        }
    }
}

impl OptionalDebugHeader {
    fn parse(buf: &mut ParseBuffer<'_>) -> OptionalDebugHeader {
        let mut header = OptionalDebugHeader::default();

        // up to 11 u16 stream indices; high-numbered fields may be absent
        let fields: [&mut u16; 11] = [
            &mut header.fpo_stream_index,
            &mut header.exception_stream_index,
            &mut header.fixup_stream_index,
            &mut header.omap_to_src_stream_index,
            &mut header.omap_from_src_stream_index,
            &mut header.section_header_stream_index,
            &mut header.token_rid_map_stream_index,
            &mut header.xdata_stream_index,
            &mut header.pdata_stream_index,
            &mut header.new_fpo_stream_index,
            &mut header.original_section_header_stream_index,
        ];

        for field in fields {
            match buf.parse_u16() {
                Ok(value) => *field = value,
                Err(_) => break,
            }
        }

        header
    }
}

/// The parsed DBI stream: the root of symbol metadata.
///
/// Owns the decoded header and substreams; the raw stream bytes are not
/// retained.
#[derive(Debug)]
pub struct DebugInformation {
    header: Header,
    module_info: Vec<u8>,
    section_contributions: Vec<SectionContribution>,
    section_map: Vec<SectionMapEntry>,
    optional_dbg_header: OptionalDebugHeader,
}

impl DebugInformation {
    /// Parses the DBI stream. Substreams follow the header in fixed order,
    /// each sized by its header field; source-info, type-server-map, and EC
    /// substreams are skipped.
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(data);
        let header = Header::parse(&mut buf)?;
        debug_assert_eq!(buf.pos(), HEADER_SIZE);

        let module_info = buf.take(header.module_info_size as usize)?.to_vec();

        let contrib_bytes = buf.take(header.section_contribution_size as usize)?;
        let section_contributions = parse_section_contributions(contrib_bytes)?;

        let map_bytes = buf.take(header.section_map_size as usize)?;
        let section_map = parse_section_map(map_bytes)?;

        buf.skip(header.source_info_size as usize)?;
        buf.skip(header.type_server_map_size as usize)?;
        buf.skip(header.ec_substream_size as usize)?;

        let mut dbg_buf = buf.sub_buffer(
            (header.optional_dbg_header_size as usize).min(buf.len()),
        )?;
        let optional_dbg_header = OptionalDebugHeader::parse(&mut dbg_buf);

        Ok(DebugInformation {
            header,
            module_info,
            section_contributions,
            section_map,
            optional_dbg_header,
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The target machine's architecture.
    pub fn machine_type(&self) -> MachineType {
        MachineType::from(self.header.machine_type)
    }

    /// An iterator over the modules (compilands) in this PDB.
    pub fn modules(&self) -> ModuleIter<'_> {
        ModuleIter {
            buf: ParseBuffer::from(self.module_info.as_slice()),
        }
    }

    /// The section-contribution table mapping address ranges to modules.
    pub fn section_contributions(&self) -> &[SectionContribution] {
        &self.section_contributions
    }

    /// The section-map entries describing logical segments.
    pub fn section_map(&self) -> &[SectionMapEntry] {
        &self.section_map
    }

    /// The optional debug-stream indices appended to the DBI.
    pub fn optional_debug_header(&self) -> &OptionalDebugHeader {
        &self.optional_dbg_header
    }
}

fn parse_section_contributions(data: &[u8]) -> Result<Vec<SectionContribution>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut buf = ParseBuffer::from(data);
    let version = buf.parse_u32()?;
    let with_crc = version == SECTION_CONTRIB_V60 || version == SECTION_CONTRIB_V2;
    let entry_size = if with_crc { 28 } else { 20 };

    let mut contributions = Vec::new();
    while buf.len() >= entry_size {
        contributions.push(SectionContribution::parse(&mut buf, with_crc)?);
    }
    Ok(contributions)
}

fn parse_section_map(data: &[u8]) -> Result<Vec<SectionMapEntry>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut buf = ParseBuffer::from(data);
    let count = buf.parse_u16()?;
    buf.parse_u16()?; // log count

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if buf.len() < 20 {
            break;
        }
        entries.push(SectionMapEntry {
            flags: buf.parse_u16()?,
            overlay: buf.parse_u16()?,
            group: buf.parse_u16()?,
            frame: buf.parse_u16()?,
            section_name: buf.parse_u16()?,
            class_name: buf.parse_u16()?,
            offset: buf.parse_u32()?,
            section_length: buf.parse_u32()?,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FallibleIterator;

    fn push_u16(v: &mut Vec<u8>, value: u16) {
        v.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(v: &mut Vec<u8>, value: u32) {
        v.extend_from_slice(&value.to_le_bytes());
    }

    fn header_bytes(module_info_size: u32, dbg_header_size: u32) -> Vec<u8> {
        let mut data = Vec::new();
        push_u32(&mut data, 0xffff_ffff); // signature -1
        push_u32(&mut data, 19990903); // V70
        push_u32(&mut data, 1); // age
        push_u16(&mut data, 5); // global stream
        push_u16(&mut data, 0); // build number
        push_u16(&mut data, 6); // public stream
        push_u16(&mut data, 0); // pdb dll version
        push_u16(&mut data, 7); // symbol record stream
        push_u16(&mut data, 0); // pdb dll rbld
        push_u32(&mut data, module_info_size);
        push_u32(&mut data, 0); // section contribution
        push_u32(&mut data, 0); // section map
        push_u32(&mut data, 0); // source info
        push_u32(&mut data, 0); // type server map
        push_u32(&mut data, 0); // mfc type server
        push_u32(&mut data, dbg_header_size);
        push_u32(&mut data, 0); // ec substream
        push_u16(&mut data, 0); // flags
        push_u16(&mut data, 0x8664); // machine
        push_u32(&mut data, 0); // reserved
        data
    }

    fn module_record(name: &str, obj: &str, stream: u16, symbols_size: u32) -> Vec<u8> {
        let mut data = Vec::new();
        push_u32(&mut data, 0); // pmod
        // section contribution with CRCs
        push_u16(&mut data, 1);
        push_u16(&mut data, 0);
        push_u32(&mut data, 0);
        push_u32(&mut data, 0x40);
        push_u32(&mut data, 0);
        push_u16(&mut data, 0);
        push_u16(&mut data, 0);
        push_u32(&mut data, 0);
        push_u32(&mut data, 0);
        push_u16(&mut data, 0); // flags
        push_u16(&mut data, stream);
        push_u32(&mut data, symbols_size);
        push_u32(&mut data, 0); // c11
        push_u32(&mut data, 0); // c13
        push_u16(&mut data, 1); // files
        push_u16(&mut data, 0); // padding
        push_u32(&mut data, 0); // filename offsets
        push_u32(&mut data, 0);
        push_u32(&mut data, 0);
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.extend_from_slice(obj.as_bytes());
        data.push(0);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        data
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let mut data = header_bytes(0, 0);
        data[0..4].copy_from_slice(&1u32.to_le_bytes());
        match DebugInformation::parse(&data) {
            Err(Error::UnsupportedVersion(_)) => (),
            other => panic!("expected UnsupportedVersion, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_modules_and_dbg_header() {
        let module = module_record("lib.obj", "lib.lib", 9, 260);
        let mut data = header_bytes(module.len() as u32, 12);
        data.extend_from_slice(&module);
        // optional debug header with six entries present
        for idx in [0xffffu16, 0xffff, 0xffff, 0xffff, 0xffff, 10] {
            push_u16(&mut data, idx);
        }

        let dbi = DebugInformation::parse(&data).expect("dbi");
        assert_eq!(dbi.header().sym_record_stream_index, 7);
        assert_eq!(dbi.machine_type(), MachineType::Amd64);
        assert_eq!(dbi.optional_debug_header().section_header_stream_index, 10);
        assert_eq!(
            dbi.optional_debug_header().xdata_stream_index,
            INVALID_STREAM_INDEX
        );

        let modules: Vec<_> = dbi.modules().collect().expect("modules");
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].module_name, "lib.obj");
        assert_eq!(modules[0].object_file_name, "lib.lib");
        assert_eq!(modules[0].stream, 9);
        assert_eq!(modules[0].symbols_size, 260);
    }

    #[test]
    fn test_section_contributions_with_crc() {
        let mut contrib = Vec::new();
        push_u32(&mut contrib, SECTION_CONTRIB_V60);
        // one entry with CRCs
        push_u16(&mut contrib, 2);
        push_u16(&mut contrib, 0);
        push_u32(&mut contrib, 0x100);
        push_u32(&mut contrib, 0x80);
        push_u32(&mut contrib, 0);
        push_u16(&mut contrib, 3);
        push_u16(&mut contrib, 0);
        push_u32(&mut contrib, 0xdead_beef);
        push_u32(&mut contrib, 0);

        let contributions = parse_section_contributions(&contrib).expect("contributions");
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].section, 2);
        assert_eq!(contributions[0].offset, 0x100);
        assert_eq!(contributions[0].module, 3);
        assert_eq!(contributions[0].data_crc, 0xdead_beef);
    }
}
