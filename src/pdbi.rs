// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use uuid::Uuid;

use crate::common::*;
use crate::dbi::HeaderVersion;

/// Metadata from the PDB-info stream (stream 1): version, signature, age,
/// and the GUID that ties the PDB to its PE image.
#[derive(Debug, Copy, Clone)]
pub struct PdbInformation {
    pub version: HeaderVersion,
    pub signature: u32,
    pub age: u32,
    pub guid: Uuid,
}

impl PdbInformation {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(data);

        let version = HeaderVersion::from(buf.parse_u32()?);
        let signature = buf.parse_u32()?;
        let age = buf.parse_u32()?;
        let guid = Uuid::from_fields(
            buf.parse_u32()?,
            buf.parse_u16()?,
            buf.parse_u16()?,
            buf.take(8)?.try_into().map_err(|_| Error::UnexpectedEof)?,
        );

        Ok(PdbInformation {
            version,
            signature,
            age,
            guid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let mut data = Vec::new();
        data.extend_from_slice(&19990903u32.to_le_bytes());
        data.extend_from_slice(&0x5c96_7a2eu32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[
            0x78, 0x56, 0x34, 0x12, 0xcd, 0xab, 0x01, 0xef, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
            0x07, 0x08,
        ]);

        let info = PdbInformation::parse(&data).expect("pdb info");
        assert_eq!(info.age, 2);
        assert_eq!(info.signature, 0x5c96_7a2e);
        assert_eq!(
            info.guid,
            Uuid::from_fields(
                0x1234_5678,
                0xabcd,
                0xef01,
                &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
            )
        );
    }

    #[test]
    fn test_too_short() {
        match PdbInformation::parse(&[0u8; 12]) {
            Err(Error::UnexpectedEof) => (),
            other => panic!("expected EOF, got {:?}", other),
        }
    }
}
