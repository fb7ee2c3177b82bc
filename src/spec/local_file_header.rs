use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
Local file header
      local file header signature     4 bytes  (0x04034b50)
      version needed to extract       2 bytes
      general purpose bit flag        2 bytes
      compression method              2 bytes
      last mod file time              2 bytes
      last mod file date              2 bytes
      crc-32                          4 bytes
      compressed size                 4 bytes
      uncompressed size               4 bytes
      file name length                2 bytes
      extra field length              2 bytes
      file name (variable size)
      extra field (variable size)
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = super::LOCAL_FILE_HEADER_SIGNATURE;
    /// Size of the header up to, excluding, the file name.
    pub const FIXED_SIZE: u64 = 30;
    /// Offset of the crc-32 field from the start of the header.
    pub const CRC32_OFFSET: u64 = 14;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        if input.read_dword()? != Self::SIGNATURE {
            return Err(ZipError::MalformedRecord("invalid local file header signature"));
        }
        let version_needed = input.read_word()?;
        let flags = input.read_word()?;
        let compression_method = input.read_word()?;
        let last_mod_time = input.read_word()?;
        let last_mod_date = input.read_word()?;
        let crc32 = input.read_dword()?;
        let compressed_size = input.read_dword()?;
        let uncompressed_size = input.read_dword()?;
        let file_name_length = input.read_word()? as usize;
        let extra_field_length = input.read_word()? as usize;
        let file_name = input.read_bytes(file_name_length)?;
        let extra_field = input.read_bytes(extra_field_length)?;

        Ok(LocalFileHeader {
            version_needed,
            flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name,
            extra_field,
        })
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        let file_name_length = u16::try_from(self.file_name.len())
            .map_err(|_| ZipError::InvalidOptions("file name is longer than 65535 bytes"))?;
        let extra_field_length = u16::try_from(self.extra_field.len())
            .map_err(|_| ZipError::InvalidOptions("extra field is longer than 65535 bytes"))?;

        out.write_dword(Self::SIGNATURE)?;
        out.write_word(self.version_needed)?;
        out.write_word(self.flags)?;
        out.write_word(self.compression_method)?;
        out.write_word(self.last_mod_time)?;
        out.write_word(self.last_mod_date)?;
        out.write_dword(self.crc32)?;
        out.write_dword(self.compressed_size)?;
        out.write_dword(self.uncompressed_size)?;
        out.write_word(file_name_length)?;
        out.write_word(extra_field_length)?;
        out.write_bytes(&self.file_name)?;
        out.write_bytes(&self.extra_field)?;
        Ok(())
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> u64 {
        Self::FIXED_SIZE + self.file_name.len() as u64 + self.extra_field.len() as u64
    }

    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        self.write(&mut out)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header() -> LocalFileHeader {
        LocalFileHeader {
            version_needed: 20,
            flags: 0x0008,
            compression_method: 8,
            last_mod_time: 0xa5a3,
            last_mod_date: 0x4d0f,
            crc32: 0xdeadbeef,
            compressed_size: 7,
            uncompressed_size: 11,
            file_name: b"test.txt".to_vec(),
            extra_field: vec![0x0a, 0x00, 0x00, 0x00],
        }
    }

    #[test]
    fn layout_matches_format() {
        let bytes = header().encode().unwrap();
        assert_eq!(bytes.len() as u64, header().len());
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(&bytes[14..18], &0xdeadbeefu32.to_le_bytes());
        assert_eq!(&bytes[26..28], &8u16.to_le_bytes());
        assert_eq!(&bytes[30..38], b"test.txt");

        let mut input = DataInput::new(&bytes[..]);
        assert_eq!(LocalFileHeader::read(&mut input).unwrap(), header());
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn wrong_signature_is_malformed() {
        let mut bytes = header().encode().unwrap();
        bytes[2] = 0x01;
        let mut input = DataInput::new(&bytes[..]);
        assert!(matches!(
            LocalFileHeader::read(&mut input),
            Err(ZipError::MalformedRecord(_))
        ));
    }

    #[test]
    fn truncated_name_is_malformed() {
        let bytes = header().encode().unwrap();
        let mut input = DataInput::new(&bytes[..33]);
        assert!(matches!(
            LocalFileHeader::read(&mut input),
            Err(ZipError::MalformedRecord(_))
        ));
    }
}
