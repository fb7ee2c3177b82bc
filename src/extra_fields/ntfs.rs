use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/// NTFS extra field (0x000a) with its timestamp attribute.
///
/// Times are Windows file times: 100 ns ticks since 1601-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtfsTimestamps {
    /// Last modification, in 100ns ticks since 1601
    pub mtime: u64,
    /// Last access, in 100ns ticks since 1601
    pub atime: u64,
    /// Creation, in 100ns ticks since 1601
    pub ctime: u64,
}

impl NtfsTimestamps {
    /// Header id of this record
    pub const HEADER_ID: u16 = 0x000a;
    const TIMESTAMP_TAG: u16 = 0x0001;
    const TIMESTAMP_SIZE: u16 = 24;

    /// Parses the record body, returning it and the bytes used.
    pub fn parse(data: &[u8]) -> ZipResult<(Self, usize)> {
        let mut input = DataInput::new(data);
        let _reserved = input.read_dword()?;
        let mut found = None;
        while input.remaining() >= 4 {
            let tag = input.read_word()?;
            let size = input.read_word()?;
            if tag == Self::TIMESTAMP_TAG && size == Self::TIMESTAMP_SIZE {
                found = Some(NtfsTimestamps {
                    mtime: input.read_qword()?,
                    atime: input.read_qword()?,
                    ctime: input.read_qword()?,
                });
            } else {
                input.skip(size as u64)?;
            }
        }
        let timestamps =
            found.ok_or(ZipError::MalformedRecord("NTFS extra field has no timestamps"))?;
        Ok((timestamps, input.position() as usize))
    }

    /// Encodes the record body.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        out.write_dword(0)?;
        out.write_word(Self::TIMESTAMP_TAG)?;
        out.write_word(Self::TIMESTAMP_SIZE)?;
        out.write_qword(self.mtime)?;
        out.write_qword(self.atime)?;
        out.write_qword(self.ctime)?;
        Ok(out.into_inner())
    }
}
