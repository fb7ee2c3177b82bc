use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::ZipResult;

/*
Data descriptor
      signature (optional)            4 bytes  (0x08074b50)
      crc-32                          4 bytes
      compressed size                 4 bytes, 8 bytes for Zip64
      uncompressed size               4 bytes, 8 bytes for Zip64
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = super::DATA_DESCRIPTOR_SIGNATURE;

    /// Reads a descriptor whose leading signature may be absent.
    pub fn read<R: Read>(input: &mut DataInput<R>, zip64: bool) -> ZipResult<Self> {
        let mut crc32 = input.read_dword()?;
        if crc32 == Self::SIGNATURE {
            crc32 = input.read_dword()?;
        }
        let (compressed_size, uncompressed_size) = if zip64 {
            (input.read_qword()?, input.read_qword()?)
        } else {
            (input.read_dword()? as u64, input.read_dword()? as u64)
        };
        Ok(DataDescriptor {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Writes the descriptor, always with its signature.
    pub fn write<W: Write>(&self, out: &mut DataOutput<W>, zip64: bool) -> ZipResult<()> {
        out.write_dword(Self::SIGNATURE)?;
        out.write_dword(self.crc32)?;
        if zip64 {
            out.write_qword(self.compressed_size)?;
            out.write_qword(self.uncompressed_size)?;
        } else {
            out.write_dword(self.compressed_size as u32)?;
            out.write_dword(self.uncompressed_size as u32)?;
        }
        Ok(())
    }

    pub fn len(zip64: bool) -> u64 {
        if zip64 {
            24
        } else {
            16
        }
    }

    pub fn encode(&self, zip64: bool) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        self.write(&mut out, zip64)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn width_follows_zip64() {
        let descriptor = DataDescriptor {
            crc32: 0xcafebabe,
            compressed_size: 10,
            uncompressed_size: 1 << 33,
        };
        let wide = descriptor.encode(true).unwrap();
        assert_eq!(wide.len() as u64, DataDescriptor::len(true));
        let mut input = DataInput::new(&wide[..]);
        assert_eq!(DataDescriptor::read(&mut input, true).unwrap(), descriptor);

        let narrow = DataDescriptor {
            uncompressed_size: 20,
            ..descriptor
        };
        let bytes = narrow.encode(false).unwrap();
        assert_eq!(bytes.len() as u64, DataDescriptor::len(false));
        let mut input = DataInput::new(&bytes[..]);
        assert_eq!(DataDescriptor::read(&mut input, false).unwrap(), narrow);
    }

    #[test]
    fn signature_is_optional() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x11223344u32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&9u32.to_le_bytes());
        let mut input = DataInput::new(&bytes[..]);
        let descriptor = DataDescriptor::read(&mut input, false).unwrap();
        assert_eq!(descriptor.crc32, 0x11223344);
        assert_eq!(descriptor.compressed_size, 5);
        assert_eq!(descriptor.uncompressed_size, 9);
        assert_eq!(input.remaining(), 0);
    }
}
