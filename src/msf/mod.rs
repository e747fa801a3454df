// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The MSF (Multi-Stream File) container underlying PDB 7.0.
//!
//! An MSF is a block-addressed file system in a file: a superblock at offset
//! zero describes the block size and the location of a *stream directory*,
//! which in turn lists every stream's size and the blocks it occupies. The
//! directory itself is reached through two levels of indirection: the
//! superblock names a block holding the directory's block list, and that
//! list names the blocks holding the directory bytes.

use std::sync::OnceLock;

use log::debug;

use crate::common::*;
use crate::source::Source;

mod stream;
pub use self::stream::StreamReader;

/// The 32-byte magic at the start of every PDB 7.0 file.
pub const MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// A stream size of `0xffffffff` marks a deleted ("nil") stream.
pub const NIL_STREAM_SIZE: u32 = 0xffff_ffff;

/// Well-known stream indices fixed by the format.
pub const STREAM_PDB_INFO: u32 = 1;
pub const STREAM_TPI: u32 = 2;
pub const STREAM_DBI: u32 = 3;
pub const STREAM_IPI: u32 = 4;

const SUPERBLOCK_SIZE: usize = 56;

/// The file-prefix structure describing the container layout.
#[derive(Debug, Copy, Clone)]
pub struct SuperBlock {
    /// Block size in bytes; a power of two between 512 and 65536.
    pub block_size: u32,
    /// Index of the active free-block-map block, always 1 or 2. The read
    /// path is agnostic to which is active.
    pub free_block_map: u32,
    /// Total number of blocks; `num_blocks * block_size` equals the file
    /// size.
    pub num_blocks: u32,
    /// Size of the stream directory in bytes.
    pub num_directory_bytes: u32,
    /// Reserved.
    pub unknown: u32,
    /// Block index of the directory's block-map (the list of blocks holding
    /// the directory bytes).
    pub block_map_addr: u32,
}

impl SuperBlock {
    fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        let magic = buf.take(32)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let sb = SuperBlock {
            block_size: buf.parse_u32()?,
            free_block_map: buf.parse_u32()?,
            num_blocks: buf.parse_u32()?,
            num_directory_bytes: buf.parse_u32()?,
            unknown: buf.parse_u32()?,
            block_map_addr: buf.parse_u32()?,
        };

        if !(512..=65536).contains(&sb.block_size) || !sb.block_size.is_power_of_two() {
            return Err(Error::InvalidBlockSize(sb.block_size));
        }
        if sb.free_block_map != 1 && sb.free_block_map != 2 {
            return Err(Error::InvalidFpmBlock(sb.free_block_map));
        }

        Ok(sb)
    }

    /// Number of blocks needed to store `bytes`.
    #[inline]
    pub fn blocks_needed(&self, bytes: u32) -> u32 {
        (bytes + self.block_size - 1) / self.block_size
    }

    /// Byte offset of the given block.
    #[inline]
    pub fn block_offset(&self, block: u32) -> u64 {
        u64::from(block) * u64::from(self.block_size)
    }

    fn validate_block(&self, block: u32) -> Result<u32> {
        if block >= self.num_blocks {
            Err(Error::InvalidBlockIndex(block))
        } else {
            Ok(block)
        }
    }
}

/// The decoded stream directory: each stream's size and block list.
#[derive(Debug)]
pub struct StreamDirectory {
    sizes: Vec<u32>,
    blocks: Vec<Vec<u32>>,
}

impl StreamDirectory {
    fn parse(data: &[u8], sb: &SuperBlock) -> Result<Self> {
        let mut buf = ParseBuffer::from(data);

        let num_streams = buf.parse_u32()?;
        let mut sizes = Vec::with_capacity(num_streams as usize);
        for _ in 0..num_streams {
            sizes.push(buf.parse_u32()?);
        }

        // Nil and empty streams consume no block-index words.
        let mut blocks = Vec::with_capacity(num_streams as usize);
        for &size in &sizes {
            if size == NIL_STREAM_SIZE || size == 0 {
                blocks.push(Vec::new());
                continue;
            }

            let count = sb.blocks_needed(size);
            let mut list = Vec::with_capacity(count as usize);
            for _ in 0..count {
                list.push(sb.validate_block(buf.parse_u32()?)?);
            }
            blocks.push(list);
        }

        Ok(StreamDirectory { sizes, blocks })
    }

    /// The number of streams described by the directory, nil streams
    /// included.
    pub fn num_streams(&self) -> u32 {
        self.sizes.len() as u32
    }

    /// The size of a stream in bytes, or 0 for nil or out-of-range streams.
    pub fn stream_size(&self, index: u32) -> u32 {
        match self.sizes.get(index as usize) {
            Some(&size) if size != NIL_STREAM_SIZE => size,
            _ => 0,
        }
    }

    /// Whether the stream exists and is neither nil nor empty.
    pub fn stream_exists(&self, index: u32) -> bool {
        matches!(self.sizes.get(index as usize), Some(&size) if size != NIL_STREAM_SIZE && size > 0)
    }

    fn stream(&self, index: u32) -> Result<(u32, &[u32])> {
        let size = *self
            .sizes
            .get(index as usize)
            .ok_or(Error::InvalidStreamIndex(index))?;
        if size == NIL_STREAM_SIZE {
            return Err(Error::StreamNotFound(index));
        }
        Ok((size, &self.blocks[index as usize]))
    }
}

/// An opened MSF container: a validated superblock, a lazily loaded
/// directory, and the byte source everything reads from.
#[derive(Debug)]
pub struct Msf<S> {
    source: S,
    superblock: SuperBlock,
    directory: OnceLock<Result<StreamDirectory>>,
}

impl<S: Source> Msf<S> {
    /// Opens the container: reads and validates the superblock and checks
    /// the file is large enough to hold the declared block count. No other
    /// I/O is performed.
    pub fn open(source: S) -> Result<Self> {
        let mut header = [0u8; SUPERBLOCK_SIZE];
        source
            .read_exact_at(&mut header, 0)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::InvalidMagic,
                _ => Error::from(e),
            })?;

        let superblock = SuperBlock::parse(&mut ParseBuffer::from(&header[..]))?;

        let file_size = source.size()?;
        let expected = u64::from(superblock.num_blocks) * u64::from(superblock.block_size);
        if file_size < expected {
            return Err(Error::Truncated);
        }

        Ok(Msf {
            source,
            superblock,
            directory: OnceLock::new(),
        })
    }

    /// The validated superblock.
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// The container's block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.superblock.block_size
    }

    /// The stream directory, loaded and parsed on first access. A parse
    /// failure is sticky: every caller observes the same error.
    pub fn directory(&self) -> Result<&StreamDirectory> {
        self.directory
            .get_or_init(|| self.load_directory())
            .as_ref()
            .map_err(Error::clone)
    }

    fn load_directory(&self) -> Result<StreamDirectory> {
        let sb = &self.superblock;

        // Level one: the block map is an array of block indices whose
        // concatenation holds the directory bytes. It starts at
        // block_map_addr and may itself span multiple blocks.
        let dir_blocks = sb.blocks_needed(sb.num_directory_bytes);
        let map_blocks = sb.blocks_needed(dir_blocks * 4);

        let mut map_bytes = vec![0u8; (map_blocks * sb.block_size) as usize];
        for i in 0..map_blocks {
            let block = sb.validate_block(sb.block_map_addr + i)?;
            let dst = (i * sb.block_size) as usize;
            self.source
                .read_exact_at(
                    &mut map_bytes[dst..dst + sb.block_size as usize],
                    sb.block_offset(block),
                )
                .map_err(|_| Error::Truncated)?;
        }

        let mut map_buf = ParseBuffer::from(map_bytes.as_slice());
        let mut block_map = Vec::with_capacity(dir_blocks as usize);
        for _ in 0..dir_blocks {
            block_map.push(sb.validate_block(map_buf.parse_u32()?)?);
        }

        // Level two: concatenate the directory blocks, trimming the final
        // one to num_directory_bytes. Trailing block padding is never parsed
        // as directory content.
        let mut dir_bytes = vec![0u8; sb.num_directory_bytes as usize];
        let mut remaining = sb.num_directory_bytes as usize;
        for (i, &block) in block_map.iter().enumerate() {
            let to_read = remaining.min(sb.block_size as usize);
            let dst = i * sb.block_size as usize;
            self.source
                .read_exact_at(&mut dir_bytes[dst..dst + to_read], sb.block_offset(block))
                .map_err(|_| Error::Truncated)?;
            remaining -= to_read;
        }

        let directory = StreamDirectory::parse(&dir_bytes, sb)?;
        debug!(
            "loaded stream directory: {} streams, {} directory bytes",
            directory.num_streams(),
            sb.num_directory_bytes
        );
        Ok(directory)
    }

    /// Returns a virtual stream reader for the given stream.
    pub fn open_stream(&self, index: u32) -> Result<StreamReader<'_, S>> {
        let directory = self.directory()?;
        let (size, blocks) = directory.stream(index)?;
        Ok(StreamReader::new(
            &self.source,
            blocks,
            self.superblock.block_size,
            size,
        ))
    }

    /// Reads an entire stream into memory.
    pub fn read_stream(&self, index: u32) -> Result<Vec<u8>> {
        self.open_stream(index)?.bytes()
    }
}
