// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The TPI and IPI streams: concatenated, length-framed CodeView type
//! records indexed by [`TypeIndex`].

use std::result;

use log::debug;

use crate::common::*;
use crate::FallibleIterator;

pub(crate) mod constants;
mod data;
mod primitive;

pub use self::data::*;
pub use self::primitive::{simple_type_info, SimpleTypeInfo};

/// Stream versions this reader accepts.
const VERSION_V70: u32 = 19990903;
const VERSION_V80: u32 = 20040203;

const HEADER_SIZE: u32 = 56;

/// The 56-byte TPI/IPI stream header.
#[derive(Debug, Copy, Clone)]
pub struct Header {
    pub version: u32,
    pub header_size: u32,
    pub minimum_index: u32,
    pub maximum_index: u32,
    pub record_bytes: u32,
    pub hash_stream: u16,
    pub hash_aux_stream: u16,
    pub hash_key_size: u32,
    pub hash_bucket_count: u32,
    pub hash_values_offset: i32,
    pub hash_values_size: u32,
    pub index_offsets_offset: i32,
    pub index_offsets_size: u32,
    pub hash_adj_offset: i32,
    pub hash_adj_size: u32,
}

impl Header {
    fn empty() -> Self {
        Header {
            version: 0,
            header_size: 0,
            minimum_index: TypeIndex::FIRST_USER.0,
            maximum_index: TypeIndex::FIRST_USER.0,
            record_bytes: 0,
            hash_stream: 0,
            hash_aux_stream: 0,
            hash_key_size: 0,
            hash_bucket_count: 0,
            hash_values_offset: 0,
            hash_values_size: 0,
            index_offsets_offset: 0,
            index_offsets_size: 0,
            hash_adj_offset: 0,
            hash_adj_size: 0,
        }
    }

    fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        let header = Header {
            version: buf.parse_u32()?,
            header_size: buf.parse_u32()?,
            minimum_index: buf.parse_u32()?,
            maximum_index: buf.parse_u32()?,
            record_bytes: buf.parse_u32()?,
            hash_stream: buf.parse_u16()?,
            hash_aux_stream: buf.parse_u16()?,
            hash_key_size: buf.parse_u32()?,
            hash_bucket_count: buf.parse_u32()?,
            hash_values_offset: buf.parse_i32()?,
            hash_values_size: buf.parse_u32()?,
            index_offsets_offset: buf.parse_i32()?,
            index_offsets_size: buf.parse_u32()?,
            hash_adj_offset: buf.parse_i32()?,
            hash_adj_size: buf.parse_u32()?,
        };

        if header.version != VERSION_V70 && header.version != VERSION_V80 {
            return Err(Error::UnsupportedVersion(header.version));
        }
        if header.header_size < HEADER_SIZE || header.maximum_index < header.minimum_index {
            return Err(Error::InvalidRecord);
        }

        Ok(header)
    }
}

/// A parsed TPI or IPI stream: the header, the raw record area, and a
/// position index giving O(1) access to any record by [`TypeIndex`].
///
/// Record order in the stream matches ascending type index, so the position
/// index is built in one sequential pass over the record area.
#[derive(Debug)]
pub struct TypeInformation {
    header: Header,
    records: Vec<u8>,
    offsets: Vec<u32>,
}

impl TypeInformation {
    pub(crate) fn parse(data: Vec<u8>) -> Result<Self> {
        // A missing TPI or IPI stream parses as an empty shell that never
        // resolves any type.
        if data.is_empty() {
            return Ok(TypeInformation {
                header: Header::empty(),
                records: Vec::new(),
                offsets: Vec::new(),
            });
        }

        let header = {
            let mut buf = ParseBuffer::from(data.as_slice());
            Header::parse(&mut buf)?
        };

        let start = header.header_size as usize;
        let end = start
            .checked_add(header.record_bytes as usize)
            .ok_or(Error::Truncated)?;
        if end > data.len() {
            return Err(Error::Truncated);
        }
        let records = data[start..end].to_vec();

        let count = (header.maximum_index - header.minimum_index) as usize;
        let mut offsets = Vec::with_capacity(count);

        // One linear pass: record i begins where record i-1's length field
        // said it would end.
        let mut buf = ParseBuffer::from(records.as_slice());
        while !buf.is_empty() && offsets.len() < count {
            offsets.push(buf.pos() as u32);
            let length = buf.parse_u16()? as usize;
            if length < 2 {
                return Err(Error::InvalidRecord);
            }
            buf.skip(length)?;
        }

        debug!(
            "indexed type stream: {} records, {} record bytes",
            offsets.len(),
            header.record_bytes
        );

        Ok(TypeInformation {
            header,
            records,
            offsets,
        })
    }

    /// The decoded stream header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The first user-defined type index in this stream.
    pub fn index_begin(&self) -> TypeIndex {
        TypeIndex(self.header.minimum_index)
    }

    /// One past the last type index in this stream.
    pub fn index_end(&self) -> TypeIndex {
        TypeIndex(self.header.maximum_index)
    }

    /// The number of records stored in the stream. Primitive types are not
    /// stored, so the number of reachable types is higher.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns whether the stream holds any records.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Returns the raw `(kind, payload)` of the record for `index`. The
    /// payload borrows from the stream buffer.
    pub fn get_raw(&self, index: TypeIndex) -> Result<(u16, &[u8])> {
        if index.is_simple()
            || index.0 < self.header.minimum_index
            || index.0 >= self.header.maximum_index
        {
            return Err(Error::TypeNotFound(index.0));
        }

        let position = (index.0 - self.header.minimum_index) as usize;
        let offset = *self.offsets.get(position).ok_or(Error::TypeNotFound(index.0))? as usize;

        let mut buf = ParseBuffer::from(&self.records[offset..]);
        let length = buf.parse_u16()? as usize;
        if length < 2 {
            return Err(Error::InvalidRecord);
        }
        let kind = buf.parse_u16()?;
        let payload = buf.take(length - 2)?;
        Ok((kind, payload))
    }

    /// Returns the framed record for `index`.
    pub fn get(&self, index: TypeIndex) -> Result<TypeRecord<'_>> {
        if index.is_simple()
            || index.0 < self.header.minimum_index
            || index.0 >= self.header.maximum_index
        {
            return Err(Error::TypeNotFound(index.0));
        }

        let position = (index.0 - self.header.minimum_index) as usize;
        let offset = *self.offsets.get(position).ok_or(Error::TypeNotFound(index.0))? as usize;

        let mut buf = ParseBuffer::from(&self.records[offset..]);
        let length = buf.parse_u16()? as usize;
        if length < 2 {
            return Err(Error::InvalidRecord);
        }
        Ok(TypeRecord {
            index,
            data: buf.take(length)?,
        })
    }

    /// Returns an iterator over the records in index order.
    pub fn iter(&self) -> TypeIter<'_> {
        TypeIter {
            buf: ParseBuffer::from(self.records.as_slice()),
            index: self.header.minimum_index,
        }
    }
}

/// A raw type record: its index and its bytes (kind tag plus payload).
///
/// `TypeRecord`s borrow from the parent [`TypeInformation`] and may not
/// outlive it.
#[derive(Copy, Clone, PartialEq)]
pub struct TypeRecord<'t> {
    index: TypeIndex,
    data: &'t [u8],
}

impl<'t> TypeRecord<'t> {
    /// This record's type index.
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// The record bytes, kind tag included, length prefix excluded.
    pub fn raw_bytes(&self) -> &'t [u8] {
        self.data
    }

    /// The record's kind tag.
    #[inline]
    pub fn raw_kind(&self) -> u16 {
        debug_assert!(self.data.len() >= 2);
        u16::from(self.data[0]) | (u16::from(self.data[1]) << 8)
    }

    /// Parses the record into a [`TypeData`].
    ///
    /// Fails with `Error::UnimplementedRecordKind` for kinds this library
    /// does not decode, and `Error::UnexpectedEof` for malformed payloads.
    pub fn parse(&self) -> Result<TypeData<'t>> {
        let mut buf = ParseBuffer::from(self.data);
        parse_type_data(&mut buf)
    }
}

impl std::fmt::Debug for TypeRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TypeRecord{{ index: {}, kind: 0x{:04x} [{} bytes] }}",
            self.index,
            self.raw_kind(),
            self.data.len()
        )
    }
}

/// A `TypeIter` iterates over a [`TypeInformation`], producing raw
/// [`TypeRecord`]s.
///
/// The cursor always advances by the record's length field, so a record
/// whose payload later fails to parse cannot desynchronize iteration.
#[derive(Debug)]
pub struct TypeIter<'t> {
    buf: ParseBuffer<'t>,
    index: u32,
}

impl<'t> FallibleIterator for TypeIter<'t> {
    type Item = TypeRecord<'t>;
    type Error = Error;

    fn next(&mut self) -> result::Result<Option<Self::Item>, Self::Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let length = self.buf.parse_u16()? as usize;
        if length < 2 {
            return Err(Error::InvalidRecord);
        }

        let data = self.buf.take(length)?;
        let index = TypeIndex(self.index);
        self.index += 1;

        Ok(Some(TypeRecord { index, data }))
    }
}
