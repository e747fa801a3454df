// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The public/global symbol indices (PSI/GSI) and the lazily built lookup
//! structures derived from the symbol-record stream.

use log::debug;

use super::{SymbolData, SymbolIter, SymbolRecord};
use crate::common::*;

/// An entry of the GSI hash-record table: an offset into the symbol-record
/// stream (stored off by one; zero means empty) and a reference count.
#[derive(Debug, Copy, Clone)]
pub struct HashRecord {
    pub offset: u32,
    pub cref: u32,
}

/// The Global Symbol Index stream: a hash table over the symbol-record
/// stream.
///
/// The on-disk bucket table is bitmap-compressed; it is not decompressed
/// here. Lookups go through [`NameIndex`], which rebuilds an equivalent
/// table directly from the record stream.
#[derive(Debug)]
pub struct Gsi {
    pub version_signature: u32,
    pub version: u32,
    hash_records: Vec<HashRecord>,
}

impl Gsi {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(data);

        let version_signature = buf.parse_u32()?;
        let version = buf.parse_u32()?;
        let hash_records_size = buf.parse_u32()?;
        let _bucket_size = buf.parse_u32()?;

        let num_records = hash_records_size / 8;
        let mut hash_records = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            hash_records.push(HashRecord {
                offset: buf.parse_u32()?,
                cref: buf.parse_u32()?,
            });
        }

        Ok(Gsi {
            version_signature,
            version,
            hash_records,
        })
    }

    /// Offsets of all referenced records in the symbol-record stream.
    pub fn record_offsets(&self) -> Vec<u32> {
        self.hash_records
            .iter()
            .filter(|rec| rec.offset > 0)
            .map(|rec| rec.offset - 1)
            .collect()
    }
}

/// The tail of the PSI stream following the embedded GSI.
#[derive(Debug, Copy, Clone, Default)]
pub struct PsiHeader {
    pub sym_hash_size: u32,
    pub addr_map_size: u32,
    pub num_thunks: u32,
    pub thunk_size: u32,
    pub thunk_table_section: u16,
    pub thunk_table_offset: u32,
    pub num_sections: u32,
}

/// The Public Symbol Index stream: a GSI prefix plus an address map sorted
/// by `(section, offset)`, holding offsets of every `S_PUB32` record in the
/// symbol-record stream.
#[derive(Debug)]
pub struct Psi {
    pub gsi: Gsi,
    pub header: PsiHeader,
    addr_map: Vec<u32>,
}

impl Psi {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(data);

        buf.parse_u32()?; // version signature
        buf.parse_u32()?; // version
        let hash_records_size = buf.parse_u32()?;
        let bucket_size = buf.parse_u32()?;

        buf.skip(hash_records_size as usize)?;
        buf.skip(bucket_size as usize)?;

        let header = PsiHeader {
            sym_hash_size: buf.parse_u32()?,
            addr_map_size: buf.parse_u32()?,
            num_thunks: buf.parse_u32()?,
            thunk_size: buf.parse_u32()?,
            thunk_table_section: {
                let section = buf.parse_u16()?;
                buf.parse_u16()?; // padding
                section
            },
            thunk_table_offset: buf.parse_u32()?,
            num_sections: buf.parse_u32()?,
        };

        let num_addrs = header.addr_map_size / 4;
        let mut addr_map = Vec::with_capacity(num_addrs as usize);
        for _ in 0..num_addrs {
            addr_map.push(buf.parse_u32()?);
        }

        let gsi = Gsi::parse(data)?;

        Ok(Psi {
            gsi,
            header,
            addr_map,
        })
    }

    /// Offsets into the symbol-record stream, sorted by symbol address.
    pub fn address_map(&self) -> &[u32] {
        &self.addr_map
    }
}

/// Number of buckets in the rebuilt name hash table.
const NAME_BUCKETS: u32 = 4096;

/// The name hash: `h = h * 31 + byte (mod 2^32)`.
pub fn hash_name(name: &[u8]) -> u32 {
    let mut hash = 0u32;
    for &byte in name {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    hash
}

#[derive(Debug)]
struct NameEntry {
    name: Vec<u8>,
    sym_offset: u32,
}

/// A hash table from raw symbol name to symbol-record offsets, built in one
/// linear scan over the record stream.
#[derive(Debug)]
pub struct NameIndex {
    buckets: Vec<Vec<NameEntry>>,
}

impl NameIndex {
    /// Scans every record once; nameable kinds are decoded just far enough
    /// to extract the raw name. Records with unknown kinds or malformed
    /// payloads are skipped, never breaking the scan.
    pub fn build(sym_data: &[u8]) -> NameIndex {
        let mut buckets: Vec<Vec<NameEntry>> = Vec::new();
        buckets.resize_with(NAME_BUCKETS as usize, Vec::new);

        let mut count = 0usize;
        let mut offset = 0usize;
        while let Ok((record, next)) = SymbolIter::record_at(sym_data, offset) {
            if let Some(name) = record.name() {
                if !name.is_empty() {
                    let bucket = (hash_name(name.as_bytes()) % NAME_BUCKETS) as usize;
                    buckets[bucket].push(NameEntry {
                        name: name.as_bytes().to_vec(),
                        sym_offset: offset as u32,
                    });
                    count += 1;
                }
            }
            offset = next;
        }

        debug!("built symbol name index: {} names", count);
        NameIndex { buckets }
    }

    /// Returns the record offsets of every symbol whose raw name equals
    /// `name`, walking the hash bucket linearly.
    pub fn find(&self, name: &[u8]) -> Vec<u32> {
        let bucket = (hash_name(name) % NAME_BUCKETS) as usize;
        self.buckets[bucket]
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| entry.sym_offset)
            .collect()
    }
}

/// One entry of the address index: a public symbol's location and its
/// record offset.
#[derive(Debug, Copy, Clone)]
pub struct AddressEntry {
    pub section: u16,
    pub offset: u32,
    pub sym_offset: u32,
}

/// The result of an address lookup.
#[derive(Debug, Copy, Clone)]
pub struct AddressMatch {
    pub sym_offset: u32,
    /// True when the symbol starts exactly at the queried address, false
    /// when it merely contains it.
    pub exact: bool,
}

/// A `(section, offset)`-sorted table of public symbols, built from the PSI
/// address map.
#[derive(Debug)]
pub struct AddressIndex {
    entries: Vec<AddressEntry>,
}

impl AddressIndex {
    /// Decodes just enough of each referenced record to extract its
    /// location. Entries that are not `S_PUB32` are rejected.
    pub fn build(addr_map: &[u32], sym_data: &[u8]) -> AddressIndex {
        let mut entries = Vec::with_capacity(addr_map.len());

        for &sym_offset in addr_map {
            let record = match SymbolIter::record_at(sym_data, sym_offset as usize) {
                Ok((record, _)) => record,
                Err(_) => continue,
            };

            if let Ok(SymbolData::Public {
                offset, section, ..
            }) = record.parse()
            {
                entries.push(AddressEntry {
                    section,
                    offset,
                    sym_offset,
                });
            }
        }

        entries.sort_by_key(|entry| (entry.section, entry.offset));
        debug!("built symbol address index: {} entries", entries.len());
        AddressIndex { entries }
    }

    /// Binary-searches for the largest entry at or before
    /// `(section, offset)` within the same section: the containing symbol.
    pub fn find(&self, section: u16, offset: u32) -> Option<AddressMatch> {
        let index = self
            .entries
            .partition_point(|entry| (entry.section, entry.offset) < (section, offset));

        if let Some(entry) = self.entries.get(index) {
            if entry.section == section && entry.offset == offset {
                return Some(AddressMatch {
                    sym_offset: entry.sym_offset,
                    exact: true,
                });
            }
        }

        if index > 0 {
            let prev = self.entries[index - 1];
            if prev.section == section {
                return Some(AddressMatch {
                    sym_offset: prev.sym_offset,
                    exact: false,
                });
            }
        }

        None
    }

    /// The sorted entries.
    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }
}

/// Extracts the raw name of the record at `sym_offset`, used when
/// reconstructing a [`SymbolRecord`] found through an index.
pub(crate) fn record_at(sym_data: &[u8], sym_offset: u32) -> Result<SymbolRecord<'_>> {
    SymbolIter::record_at(sym_data, sym_offset as usize).map(|(record, _)| record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::constants::*;

    fn pub32(name: &str, section: u16, offset: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&S_PUB32.to_le_bytes());
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

    fn stream_of(records: &[Vec<u8>]) -> (Vec<u8>, Vec<u32>) {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        for rec in records {
            offsets.push(data.len() as u32);
            data.extend_from_slice(rec);
        }
        (data, offsets)
    }

    #[test]
    fn test_hash_name() {
        // h = h * 31 + b over the bytes
        assert_eq!(hash_name(b""), 0);
        assert_eq!(hash_name(b"a"), 97);
        assert_eq!(hash_name(b"ab"), 97 * 31 + 98);
    }

    #[test]
    fn test_name_index_find() {
        let (data, offsets) = stream_of(&[
            pub32("main", 1, 0x100),
            pub32("helper", 1, 0x200),
            pub32("main", 2, 0x300),
        ]);

        let index = NameIndex::build(&data);
        assert_eq!(index.find(b"main"), vec![offsets[0], offsets[2]]);
        assert_eq!(index.find(b"helper"), vec![offsets[1]]);
        assert!(index.find(b"absent").is_empty());
    }

    #[test]
    fn test_address_index_containing_lookup() {
        let (data, offsets) = stream_of(&[
            pub32("a", 1, 0x100),
            pub32("b", 1, 0x200),
            pub32("c", 2, 0x080),
        ]);

        // address map deliberately out of order; build sorts it
        let addr_map = [offsets[1], offsets[2], offsets[0]];
        let index = AddressIndex::build(&addr_map, &data);

        let entries = index.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| {
            (w[0].section, w[0].offset) < (w[1].section, w[1].offset)
        }));

        // exact hit
        let hit = index.find(1, 0x200).expect("hit");
        assert_eq!(hit.sym_offset, offsets[1]);
        assert!(hit.exact);

        // containing hit
        let hit = index.find(1, 0x250).expect("hit");
        assert_eq!(hit.sym_offset, offsets[1]);
        assert!(!hit.exact);

        // before the first symbol of the section
        assert!(index.find(1, 0x050).is_none());
        // a section with no symbols
        assert!(index.find(3, 0x100).is_none());
        // offsets in another section never leak across
        let hit = index.find(2, 0x090).expect("hit");
        assert_eq!(hit.sym_offset, offsets[2]);
    }

    #[test]
    fn test_psi_parse() {
        // GSI prefix with one hash record, empty buckets
        let mut data = Vec::new();
        data.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        data.extend_from_slice(&0xeffe_0000u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes()); // hash records size
        data.extend_from_slice(&0u32.to_le_bytes()); // bucket size
        data.extend_from_slice(&1u32.to_le_bytes()); // record offset (+1)
        data.extend_from_slice(&1u32.to_le_bytes()); // cref
        // PSI tail
        data.extend_from_slice(&0u32.to_le_bytes()); // sym hash size
        data.extend_from_slice(&8u32.to_le_bytes()); // addr map size
        data.extend_from_slice(&0u32.to_le_bytes()); // thunks
        data.extend_from_slice(&0u32.to_le_bytes()); // thunk size
        data.extend_from_slice(&0u16.to_le_bytes()); // thunk section
        data.extend_from_slice(&0u16.to_le_bytes()); // padding
        data.extend_from_slice(&0u32.to_le_bytes()); // thunk offset
        data.extend_from_slice(&1u32.to_le_bytes()); // num sections
        data.extend_from_slice(&0u32.to_le_bytes()); // addr map entry 0
        data.extend_from_slice(&42u32.to_le_bytes()); // addr map entry 1

        let psi = Psi::parse(&data).expect("psi");
        assert_eq!(psi.address_map(), &[0, 42]);
        assert_eq!(psi.gsi.record_offsets(), vec![0]);
        assert_eq!(psi.header.num_sections, 1);
    }
}
