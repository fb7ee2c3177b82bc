use crate::codec::{DataInput, DataOutput};
use crate::compression::CompressionMethod;
use crate::result::{ZipError, ZipResult};
use crate::types::{AesMode, AesVendorVersion};

/// AE-x extra field (0x9901), carrying the real compression method of an
/// entry whose headers announce method 99.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraField {
    /// AE-1 or AE-2
    pub vendor_version: AesVendorVersion,
    /// Key strength
    pub mode: AesMode,
    /// Compression method of the payload under the encryption
    pub compression_method: CompressionMethod,
}

impl AesExtraField {
    /// Header id of this record
    pub const HEADER_ID: u16 = 0x9901;
    const VENDOR_ID: u16 = 0x4541; // "AE"
    const SIZE: usize = 7;

    /// Parses the record body, returning it and the bytes used.
    pub fn parse(data: &[u8]) -> ZipResult<(Self, usize)> {
        if data.len() != Self::SIZE {
            return Err(ZipError::MalformedRecord(
                "AES extra data field has an unsupported length",
            ));
        }
        let mut input = DataInput::new(data);
        let vendor_version = AesVendorVersion::from_u16(input.read_word()?)
            .ok_or(ZipError::UnsupportedArchive("Invalid AES vendor version"))?;
        if input.read_word()? != Self::VENDOR_ID {
            return Err(ZipError::MalformedRecord("Invalid AES vendor"));
        }
        let mode = AesMode::from_strength(input.read_byte()?)
            .ok_or(ZipError::UnsupportedArchive("Invalid AES encryption strength"))?;
        let compression_method = CompressionMethod::from_u16(input.read_word()?);
        Ok((
            AesExtraField {
                vendor_version,
                mode,
                compression_method,
            },
            Self::SIZE,
        ))
    }

    /// Encodes the record body.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        out.write_word(self.vendor_version.to_u16())?;
        out.write_word(Self::VENDOR_ID)?;
        out.write_byte(self.mode.strength())?;
        out.write_word(self.compression_method.to_u16())?;
        Ok(out.into_inner())
    }
}
