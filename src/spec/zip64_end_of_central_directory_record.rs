use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
Zip64 end of central directory record

        zip64 end of central dir
        signature                       4 bytes  (0x06064b50)
        size of zip64 end of central
        directory record                8 bytes
        version made by                 2 bytes
        version needed to extract       2 bytes
        number of this disk             4 bytes
        number of the disk with the
        start of the central directory  4 bytes
        total number of entries in the
        central directory on this disk  8 bytes
        total number of entries in the
        central directory               8 bytes
        size of the central directory   8 bytes
        offset of start of central
        directory with respect to
        the starting disk number        8 bytes
        zip64 extensible data sector    (variable size)
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64CentralDirectoryEnd {
    pub version_made_by: u16,
    pub version_needed_to_extract: u16,
    pub disk_number: u32,
    pub disk_with_central_directory: u32,
    pub number_of_files_on_this_disk: u64,
    pub number_of_files: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub extensible_data: Vec<u8>,
}

impl Zip64CentralDirectoryEnd {
    pub const SIGNATURE: u32 = super::ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE;
    /// Bytes following the size field, extensible data excluded.
    const FIXED_REST: u64 = 44;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        if input.read_dword()? != Self::SIGNATURE {
            return Err(ZipError::MalformedRecord(
                "invalid zip64 end of central directory signature",
            ));
        }
        let record_size = input.read_qword()?;
        if record_size < Self::FIXED_REST {
            return Err(ZipError::MalformedRecord(
                "zip64 end of central directory record is too short",
            ));
        }
        let version_made_by = input.read_word()?;
        let version_needed_to_extract = input.read_word()?;
        let disk_number = input.read_dword()?;
        let disk_with_central_directory = input.read_dword()?;
        let number_of_files_on_this_disk = input.read_qword()?;
        let number_of_files = input.read_qword()?;
        let central_directory_size = input.read_qword()?;
        let central_directory_offset = input.read_qword()?;
        let extensible_length = usize::try_from(record_size - Self::FIXED_REST)
            .map_err(|_| ZipError::MalformedRecord("zip64 extensible data is too large"))?;
        let extensible_data = input.read_bytes(extensible_length)?;

        Ok(Zip64CentralDirectoryEnd {
            version_made_by,
            version_needed_to_extract,
            disk_number,
            disk_with_central_directory,
            number_of_files_on_this_disk,
            number_of_files,
            central_directory_size,
            central_directory_offset,
            extensible_data,
        })
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        out.write_dword(Self::SIGNATURE)?;
        out.write_qword(Self::FIXED_REST + self.extensible_data.len() as u64)?;
        out.write_word(self.version_made_by)?;
        out.write_word(self.version_needed_to_extract)?;
        out.write_dword(self.disk_number)?;
        out.write_dword(self.disk_with_central_directory)?;
        out.write_qword(self.number_of_files_on_this_disk)?;
        out.write_qword(self.number_of_files)?;
        out.write_qword(self.central_directory_size)?;
        out.write_qword(self.central_directory_offset)?;
        out.write_bytes(&self.extensible_data)?;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        12 + Self::FIXED_REST + self.extensible_data.len() as u64
    }

    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        self.write(&mut out)?;
        Ok(out.into_inner())
    }
}

/*
Zip64 extensible data sector of an archive with an encrypted central directory

        compression method              2 bytes
        compressed size                 8 bytes
        original size                   8 bytes
        alg id                          2 bytes
        bit length                      2 bytes
        flags                           2 bytes
        hash id                         2 bytes
        hash length                     2 bytes
        hash data                       (variable size)
*/

/// Describes how the central directory itself was encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEncryption {
    pub compression_method: u16,
    pub compressed_size: u64,
    pub original_size: u64,
    pub alg_id: u16,
    pub bit_length: u16,
    pub flags: u16,
    pub hash_id: u16,
    pub hash: Vec<u8>,
}

impl CentralDirectoryEncryption {
    pub fn parse(data: &[u8]) -> ZipResult<Self> {
        let mut input = DataInput::new(data);
        let compression_method = input.read_word()?;
        let compressed_size = input.read_qword()?;
        let original_size = input.read_qword()?;
        let alg_id = input.read_word()?;
        let bit_length = input.read_word()?;
        let flags = input.read_word()?;
        let hash_id = input.read_word()?;
        let hash_length = input.read_word()? as usize;
        let hash = input.read_bytes(hash_length)?;
        Ok(CentralDirectoryEncryption {
            compression_method,
            compressed_size,
            original_size,
            alg_id,
            bit_length,
            flags,
            hash_id,
            hash,
        })
    }

    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let hash_length = u16::try_from(self.hash.len())
            .map_err(|_| ZipError::InvalidOptions("central directory hash is too long"))?;
        let mut out = DataOutput::buffer();
        out.write_word(self.compression_method)?;
        out.write_qword(self.compressed_size)?;
        out.write_qword(self.original_size)?;
        out.write_word(self.alg_id)?;
        out.write_word(self.bit_length)?;
        out.write_word(self.flags)?;
        out.write_word(self.hash_id)?;
        out.write_word(hash_length)?;
        out.write_bytes(&self.hash)?;
        Ok(out.into_inner())
    }
}
