use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/// Info-ZIP extended timestamp (0x5455), Unix seconds.
///
/// Central directory copies usually carry only the modification time even
/// when the flags announce more, so absent trailing times are not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    flags: u8,
    mod_time: Option<u32>,
    ac_time: Option<u32>,
    cr_time: Option<u32>,
}

impl ExtendedTimestamp {
    /// Header id of this record
    pub const HEADER_ID: u16 = 0x5455;

    /// A record with only the modification time.
    pub fn new(mod_time: u32) -> Self {
        Self {
            flags: 0x01,
            mod_time: Some(mod_time),
            ac_time: None,
            cr_time: None,
        }
    }

    /// Which of the three times are present.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Modification time, seconds since the Unix epoch.
    pub fn mod_time(&self) -> Option<u32> {
        self.mod_time
    }

    /// Access time, seconds since the Unix epoch.
    pub fn ac_time(&self) -> Option<u32> {
        self.ac_time
    }

    /// Creation time, seconds since the Unix epoch.
    pub fn cr_time(&self) -> Option<u32> {
        self.cr_time
    }

    /// Parses the record body, returning it and the bytes used.
    pub fn parse(data: &[u8]) -> ZipResult<(Self, usize)> {
        let mut input = DataInput::new(data);
        let flags = input.read_byte()?;
        if flags & 0xF8 != 0 {
            return Err(ZipError::MalformedRecord("unknown extended timestamp flags"));
        }
        let mut times = [None; 3];
        for (bit, time) in times.iter_mut().enumerate() {
            if flags & (1 << bit) != 0 && input.remaining() >= 4 {
                *time = Some(input.read_dword()?);
            }
        }
        let [mod_time, ac_time, cr_time] = times;
        Ok((
            Self {
                flags,
                mod_time,
                ac_time,
                cr_time,
            },
            input.position() as usize,
        ))
    }

    /// Encodes the record body.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        out.write_byte(self.flags)?;
        for time in [self.mod_time, self.ac_time, self.cr_time].into_iter().flatten() {
            out.write_dword(time)?;
        }
        Ok(out.into_inner())
    }
}
