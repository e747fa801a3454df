// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::sync::Mutex;

/// A random-access byte source backing a PDB.
///
/// The MSF container asks the source for ranges of bytes at absolute file
/// offsets. Reads take `&self` and must be safe to issue from multiple
/// threads concurrently; implementations may serialize internally.
///
/// Implementations are provided for [`std::fs::File`] (positional reads),
/// for in-memory byte slices, and for any `Read + Seek` via
/// [`SerializedSource`].
pub trait Source: fmt::Debug {
    /// Total size of the source in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Reads up to `buf.len()` bytes at `offset`, returning the number of
    /// bytes read. A return of 0 means end of source.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Reads exactly `buf.len()` bytes at `offset`, or fails with
    /// `UnexpectedEof`.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "source ended before the requested range",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
impl Source for std::fs::File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl Source for std::fs::File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl Source for &[u8] {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let available = &self[offset as usize..];
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

impl Source for Vec<u8> {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

/// Adapts any `Read + Seek` into a [`Source`] by serializing access behind a
/// mutex. Positional reads seek and read under the lock.
pub struct SerializedSource<R> {
    inner: Mutex<R>,
}

impl<R> SerializedSource<R> {
    pub fn new(inner: R) -> Self {
        SerializedSource {
            inner: Mutex::new(inner),
        }
    }
}

impl<R> fmt::Debug for SerializedSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializedSource")
    }
}

impl<R: io::Read + io::Seek> Source for SerializedSource<R> {
    fn size(&self) -> io::Result<u64> {
        let mut inner = self.inner.lock().expect("source lock poisoned");
        inner.seek(io::SeekFrom::End(0))
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("source lock poisoned");
        inner.seek(io::SeekFrom::Start(offset))?;
        inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_read_at() {
        let data: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7];
        let mut buf = [0u8; 4];
        assert_eq!(data.read_at(&mut buf, 2).unwrap(), 4);
        assert_eq!(buf, [2, 3, 4, 5]);

        // short read at the tail
        assert_eq!(data.read_at(&mut buf, 6).unwrap(), 2);
        // read past the end
        assert_eq!(data.read_at(&mut buf, 8).unwrap(), 0);
        assert_eq!(data.read_at(&mut buf, 100).unwrap(), 0);
    }

    #[test]
    fn test_read_exact_at_eof() {
        let data: &[u8] = &[0, 1, 2, 3];
        let mut buf = [0u8; 8];
        let err = data.read_exact_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_serialized_source() {
        let cursor = io::Cursor::new(vec![9u8, 8, 7, 6]);
        let source = SerializedSource::new(cursor);
        assert_eq!(source.size().unwrap(), 4);

        let mut buf = [0u8; 2];
        source.read_exact_at(&mut buf, 1).unwrap();
        assert_eq!(buf, [8, 7]);
    }
}
