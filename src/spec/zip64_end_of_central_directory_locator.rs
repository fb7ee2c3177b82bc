use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
Zip64 end of central directory locator
      zip64 end of central dir locator
      signature                       4 bytes  (0x07064b50)
      number of the disk with the
      start of the zip64 end of
      central directory               4 bytes
      relative offset of the zip64
      end of central directory record 8 bytes
      total number of disks           4 bytes
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64CentralDirectoryEndLocator {
    /// number of the disk with the start of the zip64 end of central directory
    pub disk_with_central_directory: u32,
    /// relative offset of the zip64 end of central directory record
    pub end_of_central_directory_offset: u64,
    /// total number of disks
    pub number_of_disks: u32,
}

impl Zip64CentralDirectoryEndLocator {
    pub const SIGNATURE: u32 = super::ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE;
    pub const LEN: u64 = 20;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        if input.read_dword()? != Self::SIGNATURE {
            return Err(ZipError::MalformedRecord(
                "invalid zip64 end of central directory locator signature",
            ));
        }
        Ok(Zip64CentralDirectoryEndLocator {
            disk_with_central_directory: input.read_dword()?,
            end_of_central_directory_offset: input.read_qword()?,
            number_of_disks: input.read_dword()?,
        })
    }

    /// Reads a locator if `bytes` starts with one.
    pub fn parse_if_present(bytes: &[u8]) -> ZipResult<Option<Self>> {
        if bytes.len() < Self::LEN as usize || bytes[0..4] != Self::SIGNATURE.to_le_bytes() {
            return Ok(None);
        }
        Self::read(&mut DataInput::new(bytes)).map(Some)
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        out.write_dword(Self::SIGNATURE)?;
        out.write_dword(self.disk_with_central_directory)?;
        out.write_qword(self.end_of_central_directory_offset)?;
        out.write_dword(self.number_of_disks)?;
        Ok(())
    }
}
