use crate::codec::{DataInput, DataOutput};
use crate::result::ZipResult;
use crate::types::AesMode;

/// Strong encryption header extra field (0x0017).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrongEncryptionField {
    /// Record format, always 2
    pub format: u16,
    /// Algorithm id, 0x660E..=0x6610 for AES
    pub alg_id: u16,
    /// Key length in bits
    pub bit_length: u16,
    /// Processing flags
    pub flags: u16,
    /// Certificate data, unused for password encryption
    pub cert_data: Vec<u8>,
}

impl StrongEncryptionField {
    /// Header id of this record
    pub const HEADER_ID: u16 = 0x0017;

    /// The record written for password based AES encryption.
    pub fn for_mode(mode: AesMode) -> StrongEncryptionField {
        StrongEncryptionField {
            format: 2,
            alg_id: mode.alg_id(),
            bit_length: mode.bit_length(),
            flags: 0x0001,
            cert_data: Vec::new(),
        }
    }

    /// The AES strength, if the algorithm is one this crate supports.
    pub fn mode(&self) -> Option<AesMode> {
        AesMode::from_alg_id(self.alg_id)
    }

    /// Parses the record body, returning it and the bytes used.
    pub fn parse(data: &[u8]) -> ZipResult<(Self, usize)> {
        let mut input = DataInput::new(data);
        let format = input.read_word()?;
        let alg_id = input.read_word()?;
        let bit_length = input.read_word()?;
        let flags = input.read_word()?;
        let cert_data = input.read_bytes(input.remaining())?;
        Ok((
            StrongEncryptionField {
                format,
                alg_id,
                bit_length,
                flags,
                cert_data,
            },
            data.len(),
        ))
    }

    /// Encodes the record body.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        out.write_word(self.format)?;
        out.write_word(self.alg_id)?;
        out.write_word(self.bit_length)?;
        out.write_word(self.flags)?;
        out.write_bytes(&self.cert_data)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn describes_the_mode() {
        let field = StrongEncryptionField::for_mode(AesMode::Aes192);
        let bytes = field.encode().unwrap();
        assert_eq!(bytes, [0x02, 0x00, 0x0F, 0x66, 0xC0, 0x00, 0x01, 0x00]);
        let (back, consumed) = StrongEncryptionField::parse(&bytes).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(back.mode(), Some(AesMode::Aes192));
    }
}
