use std::io::prelude::*;

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

/*
Decryption header of a strong encrypted payload

      iv size                         2 bytes
      iv data                         (variable size)
      size of the remaining header    4 bytes
      format                          2 bytes  (3)
      alg id                          2 bytes
      bit length                      2 bytes
      flags                           2 bytes
      erd size                        2 bytes
      erd data                        (variable size)
      reserved                        4 bytes  (recipient count, 0 for passwords)
      vsize                           2 bytes
      vdata                           (vsize - 4 bytes)
      vcrc32                          4 bytes
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionHeader {
    pub iv: Vec<u8>,
    pub format: u16,
    pub alg_id: u16,
    pub bit_length: u16,
    pub flags: u16,
    /// Random data encrypted under the password key
    pub erd: Vec<u8>,
    /// Password validation data, encrypted under the file key
    pub vdata: Vec<u8>,
    pub vcrc32: u32,
}

impl DecryptionHeader {
    pub const FORMAT: u16 = 3;
    /// Flag announcing that the key is derived from a password.
    pub const FLAG_PASSWORD: u16 = 0x0001;

    pub fn read<R: Read>(input: &mut DataInput<R>) -> ZipResult<Self> {
        let iv_size = input.read_word()? as usize;
        let iv = input.read_bytes(iv_size)?;
        let remaining = input.read_dword()? as usize;
        let body = input.read_bytes(remaining)?;

        let mut body = DataInput::new(&body[..]);
        let format = body.read_word()?;
        if format != Self::FORMAT {
            return Err(ZipError::UnsupportedArchive(
                "unknown strong encryption header format",
            ));
        }
        let alg_id = body.read_word()?;
        let bit_length = body.read_word()?;
        let flags = body.read_word()?;
        let erd_size = body.read_word()? as usize;
        let erd = body.read_bytes(erd_size)?;
        if body.read_dword()? != 0 {
            return Err(ZipError::UnsupportedArchive(
                "certificate based strong encryption is not supported",
            ));
        }
        let vsize = body.read_word()? as usize;
        if vsize < 4 {
            return Err(ZipError::MalformedRecord("password validation data is too short"));
        }
        let vdata = body.read_bytes(vsize - 4)?;
        let vcrc32 = body.read_dword()?;
        if body.remaining() != 0 {
            return Err(ZipError::MalformedRecord(
                "decryption header size disagrees with its content",
            ));
        }
        if crc32fast::hash(&vdata) != vcrc32 {
            return Err(ZipError::MalformedRecord(
                "decryption header validation checksum mismatch",
            ));
        }

        Ok(DecryptionHeader {
            iv,
            format,
            alg_id,
            bit_length,
            flags,
            erd,
            vdata,
            vcrc32,
        })
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> ZipResult<()> {
        let too_long = |_| ZipError::InvalidOptions("decryption header field is too long");
        let iv_size = u16::try_from(self.iv.len()).map_err(too_long)?;
        let erd_size = u16::try_from(self.erd.len()).map_err(too_long)?;
        let vsize = u16::try_from(self.vdata.len() + 4).map_err(too_long)?;

        out.write_word(iv_size)?;
        out.write_bytes(&self.iv)?;
        out.write_dword(self.remaining_size())?;
        out.write_word(self.format)?;
        out.write_word(self.alg_id)?;
        out.write_word(self.bit_length)?;
        out.write_word(self.flags)?;
        out.write_word(erd_size)?;
        out.write_bytes(&self.erd)?;
        out.write_dword(0)?;
        out.write_word(vsize)?;
        out.write_bytes(&self.vdata)?;
        out.write_dword(self.vcrc32)?;
        Ok(())
    }

    fn remaining_size(&self) -> u32 {
        (20 + self.erd.len() + self.vdata.len()) as u32
    }

    pub fn len(&self) -> u64 {
        2 + self.iv.len() as u64 + 4 + self.remaining_size() as u64
    }

    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        self.write(&mut out)?;
        Ok(out.into_inner())
    }
}
