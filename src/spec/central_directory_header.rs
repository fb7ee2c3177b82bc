use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
Central directory header
        central file header signature   4 bytes  (0x02014b50)
        version made by                 2 bytes
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
        file comment length             2 bytes
        disk number start               2 bytes
        internal file attributes        2 bytes
        external file attributes        4 bytes
        relative offset of local header 4 bytes
        file name (variable size)
        extra field (variable size)
        file comment (variable size)
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number_start: u16,
    pub internal_file_attrs: u16,
    pub external_file_attrs: u32,
    pub local_header_offset: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub file_comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = super::CENTRAL_DIRECTORY_HEADER_SIGNATURE;
    pub const FIXED_SIZE: u64 = 46;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        if input.read_dword()? != Self::SIGNATURE {
            return Err(ZipError::MalformedRecord(
                "invalid central directory header signature",
            ));
        }
        let version_made_by = input.read_word()?;
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
        let file_comment_length = input.read_word()? as usize;
        let disk_number_start = input.read_word()?;
        let internal_file_attrs = input.read_word()?;
        let external_file_attrs = input.read_dword()?;
        let local_header_offset = input.read_dword()?;
        let file_name = input.read_bytes(file_name_length)?;
        let extra_field = input.read_bytes(extra_field_length)?;
        let file_comment = input.read_bytes(file_comment_length)?;

        Ok(CentralDirectoryHeader {
            version_made_by,
            version_needed,
            flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number_start,
            internal_file_attrs,
            external_file_attrs,
            local_header_offset,
            file_name,
            extra_field,
            file_comment,
        })
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        let too_long = |_| ZipError::InvalidOptions("header field is longer than 65535 bytes");
        let file_name_length = u16::try_from(self.file_name.len()).map_err(too_long)?;
        let extra_field_length = u16::try_from(self.extra_field.len()).map_err(too_long)?;
        let file_comment_length = u16::try_from(self.file_comment.len()).map_err(too_long)?;

        out.write_dword(Self::SIGNATURE)?;
        out.write_word(self.version_made_by)?;
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
        out.write_word(file_comment_length)?;
        out.write_word(self.disk_number_start)?;
        out.write_word(self.internal_file_attrs)?;
        out.write_dword(self.external_file_attrs)?;
        out.write_dword(self.local_header_offset)?;
        out.write_bytes(&self.file_name)?;
        out.write_bytes(&self.extra_field)?;
        out.write_bytes(&self.file_comment)?;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        Self::FIXED_SIZE
            + self.file_name.len() as u64
            + self.extra_field.len() as u64
            + self.file_comment.len() as u64
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

    #[test]
    fn read_back_what_was_written() {
        let header = CentralDirectoryHeader {
            version_made_by: 0x033f,
            version_needed: 45,
            flags: 0x0800,
            compression_method: 0,
            last_mod_time: 0,
            last_mod_date: 0x21,
            crc32: 0x12345678,
            compressed_size: u32::MAX,
            uncompressed_size: u32::MAX,
            disk_number_start: 2,
            internal_file_attrs: 1,
            external_file_attrs: 0o100644 << 16,
            local_header_offset: 0x400,
            file_name: "snö.txt".as_bytes().to_vec(),
            extra_field: vec![1, 0, 0, 0],
            file_comment: b"note".to_vec(),
        };
        let bytes = header.encode().unwrap();
        assert_eq!(bytes.len() as u64, header.len());
        assert_eq!(&bytes[0..4], b"PK\x01\x02");
        assert_eq!(&bytes[42..46], &0x400u32.to_le_bytes());

        let mut input = DataInput::new(&bytes[..]);
        assert_eq!(CentralDirectoryHeader::read(&mut input).unwrap(), header);
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let header = CentralDirectoryHeader {
            version_made_by: 0,
            version_needed: 10,
            flags: 0,
            compression_method: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number_start: 0,
            internal_file_attrs: 0,
            external_file_attrs: 0,
            local_header_offset: 0,
            file_name: b"a".to_vec(),
            extra_field: Vec::new(),
            file_comment: vec![b'x'; 70_000],
        };
        assert!(matches!(header.encode(), Err(ZipError::InvalidOptions(_))));
    }
}
