//! Typed records of the extra field.
//!
//! The extra field is a sequence of `(header id, size, data)` records. Known
//! records are decoded; a record whose decoder fails or does not consume
//! exactly its declared size is kept as opaque bytes instead, as are records
//! with an unknown id. Bytes at the end that do not form a complete record
//! are preserved verbatim.

use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};

mod aes;
mod extended_timestamp;
mod ntfs;
mod strong_encryption;
mod zip64;

pub use self::aes::AesExtraField;
pub use self::extended_timestamp::ExtendedTimestamp;
pub use self::ntfs::NtfsTimestamps;
pub use self::strong_encryption::StrongEncryptionField;
pub use self::zip64::{Zip64ExtendedInformation, Zip64Fields};

/// One record of the extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Zip64(Zip64ExtendedInformation),
    Aes(AesExtraField),
    Ntfs(NtfsTimestamps),
    StrongEncryption(StrongEncryptionField),
    ExtendedTimestamp(ExtendedTimestamp),
    /// A record kept as it was found
    Unknown { header_id: u16, data: Vec<u8> },
}

impl ExtraField {
    /// Header id of this record.
    pub fn header_id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => Zip64ExtendedInformation::HEADER_ID,
            ExtraField::Aes(_) => AesExtraField::HEADER_ID,
            ExtraField::Ntfs(_) => NtfsTimestamps::HEADER_ID,
            ExtraField::StrongEncryption(_) => StrongEncryptionField::HEADER_ID,
            ExtraField::ExtendedTimestamp(_) => ExtendedTimestamp::HEADER_ID,
            ExtraField::Unknown { header_id, .. } => *header_id,
        }
    }

    fn encode_data(&self) -> ZipResult<Vec<u8>> {
        match self {
            ExtraField::Zip64(field) => field.encode(),
            ExtraField::Aes(field) => field.encode(),
            ExtraField::Ntfs(field) => field.encode(),
            ExtraField::StrongEncryption(field) => field.encode(),
            ExtraField::ExtendedTimestamp(field) => field.encode(),
            ExtraField::Unknown { data, .. } => Ok(data.clone()),
        }
    }

    fn decode(header_id: u16, data: &[u8], zip64: Zip64Fields) -> ZipResult<(ExtraField, usize)> {
        Ok(match header_id {
            Zip64ExtendedInformation::HEADER_ID => {
                let (field, used) = Zip64ExtendedInformation::parse(data, zip64)?;
                (ExtraField::Zip64(field), used)
            }
            AesExtraField::HEADER_ID => {
                let (field, used) = AesExtraField::parse(data)?;
                (ExtraField::Aes(field), used)
            }
            NtfsTimestamps::HEADER_ID => {
                let (field, used) = NtfsTimestamps::parse(data)?;
                (ExtraField::Ntfs(field), used)
            }
            StrongEncryptionField::HEADER_ID => {
                let (field, used) = StrongEncryptionField::parse(data)?;
                (ExtraField::StrongEncryption(field), used)
            }
            ExtendedTimestamp::HEADER_ID => {
                let (field, used) = ExtendedTimestamp::parse(data)?;
                (ExtraField::ExtendedTimestamp(field), used)
            }
            _ => (
                ExtraField::Unknown {
                    header_id,
                    data: data.to_vec(),
                },
                data.len(),
            ),
        })
    }
}

/// The decoded extra field of one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    records: Vec<ExtraField>,
    trailing: Vec<u8>,
}

impl ExtraFields {
    /// Decodes `data`. `zip64` tells which values a Zip64 record holds.
    pub fn parse(data: &[u8], zip64: Zip64Fields) -> ZipResult<ExtraFields> {
        let mut fields = ExtraFields::default();
        let mut rest = data;
        while rest.len() >= 4 {
            let mut header = DataInput::new(&rest[..4]);
            let header_id = header.read_word()?;
            let size = header.read_word()? as usize;
            if size > rest.len() - 4 {
                break;
            }
            let body = &rest[4..4 + size];
            let record = match ExtraField::decode(header_id, body, zip64) {
                Ok((record, used)) if used == size => record,
                Ok((_, used)) => {
                    tracing::warn!(header_id, size, used, "extra field record kept as opaque bytes");
                    ExtraField::Unknown {
                        header_id,
                        data: body.to_vec(),
                    }
                }
                Err(err) => {
                    tracing::warn!(header_id, size, error = %err, "extra field record kept as opaque bytes");
                    ExtraField::Unknown {
                        header_id,
                        data: body.to_vec(),
                    }
                }
            };
            fields.records.push(record);
            rest = &rest[4 + size..];
        }
        fields.trailing = rest.to_vec();
        Ok(fields)
    }

    /// Encodes all records, headers included.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        for record in &self.records {
            let data = record.encode_data()?;
            let size = u16::try_from(data.len())
                .map_err(|_| ZipError::InvalidOptions("extra field record is too long"))?;
            out.write_word(record.header_id())?;
            out.write_word(size)?;
            out.write_bytes(&data)?;
        }
        out.write_bytes(&self.trailing)?;
        Ok(out.into_inner())
    }

    /// All records in stored order.
    pub fn records(&self) -> &[ExtraField] {
        &self.records
    }

    /// True if there is nothing to encode.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.trailing.is_empty()
    }

    /// Adds `record`, replacing a record with the same id.
    pub fn set(&mut self, record: ExtraField) {
        let header_id = record.header_id();
        match self.records.iter_mut().find(|r| r.header_id() == header_id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Removes and returns the Zip64 record.
    pub fn take_zip64(&mut self) -> Option<Zip64ExtendedInformation> {
        let index = self
            .records
            .iter()
            .position(|r| matches!(r, ExtraField::Zip64(_)))?;
        match self.records.remove(index) {
            ExtraField::Zip64(info) => Some(info),
            _ => None,
        }
    }

    /// Copy of these records preceded by `zip64`, as written to a header.
    pub fn with_zip64(&self, zip64: Option<Zip64ExtendedInformation>) -> ExtraFields {
        let mut records = Vec::with_capacity(self.records.len() + 1);
        records.extend(zip64.map(ExtraField::Zip64));
        records.extend(
            self.records
                .iter()
                .filter(|r| !matches!(r, ExtraField::Zip64(_)))
                .cloned(),
        );
        ExtraFields {
            records,
            trailing: self.trailing.clone(),
        }
    }

    /// The AES record, if any.
    pub fn aes(&self) -> Option<&AesExtraField> {
        self.records.iter().find_map(|r| match r {
            ExtraField::Aes(field) => Some(field),
            _ => None,
        })
    }

    /// The strong encryption record, if any.
    pub fn strong_encryption(&self) -> Option<&StrongEncryptionField> {
        self.records.iter().find_map(|r| match r {
            ExtraField::StrongEncryption(field) => Some(field),
            _ => None,
        })
    }

    /// The NTFS timestamps, if any.
    pub fn ntfs(&self) -> Option<&NtfsTimestamps> {
        self.records.iter().find_map(|r| match r {
            ExtraField::Ntfs(field) => Some(field),
            _ => None,
        })
    }

    /// The extended timestamp record, if any.
    pub fn extended_timestamp(&self) -> Option<&ExtendedTimestamp> {
        self.records.iter().find_map(|r| match r {
            ExtraField::ExtendedTimestamp(field) => Some(field),
            _ => None,
        })
    }
}
