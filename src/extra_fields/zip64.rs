use crate::codec::{DataInput, DataOutput};
use crate::result::ZipResult;
use crate::spec::{self, CentralDirectoryHeader, LocalFileHeader};
use crate::types::ZipFileData;

/// Zip64 extended information extra field (0x0001).
///
/// Each value is present only when the matching header field holds the
/// sentinel, and the values keep this fixed order on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInformation {
    /// Size of the file when extracted
    pub uncompressed_size: Option<u64>,
    /// Size of the file in the archive
    pub compressed_size: Option<u64>,
    /// Offset of the local header
    pub header_start: Option<u64>,
    /// Disk the local header is on
    pub disk_number: Option<u32>,
}

/// Which header fields carried the Zip64 sentinel, i.e. which values the
/// Zip64 record holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Fields {
    /// The uncompressed size is present
    pub uncompressed_size: bool,
    /// The compressed size is present
    pub compressed_size: bool,
    /// The local header offset is present
    pub header_start: bool,
    /// The disk number is present
    pub disk_number: bool,
}

impl Zip64Fields {
    /// The values a central directory header moved to the record.
    pub fn from_central(header: &CentralDirectoryHeader) -> Zip64Fields {
        Zip64Fields {
            uncompressed_size: header.uncompressed_size == u32::MAX,
            compressed_size: header.compressed_size == u32::MAX,
            header_start: header.local_header_offset == u32::MAX,
            disk_number: header.disk_number_start == u16::MAX,
        }
    }

    /// The values a local header moved to the record.
    pub fn from_local(header: &LocalFileHeader) -> Zip64Fields {
        Zip64Fields {
            uncompressed_size: header.uncompressed_size == u32::MAX,
            compressed_size: header.compressed_size == u32::MAX,
            header_start: false,
            disk_number: false,
        }
    }
}

impl Zip64ExtendedInformation {
    /// Header id of this record
    pub const HEADER_ID: u16 = 0x0001;

    /// Parses the values listed in `fields`, in their fixed order.
    pub fn parse(data: &[u8], fields: Zip64Fields) -> ZipResult<(Self, usize)> {
        let mut input = DataInput::new(data);
        let mut info = Zip64ExtendedInformation::default();
        if fields.uncompressed_size {
            info.uncompressed_size = Some(input.read_qword()?);
        }
        if fields.compressed_size {
            info.compressed_size = Some(input.read_qword()?);
        }
        if fields.header_start {
            info.header_start = Some(input.read_qword()?);
        }
        if fields.disk_number {
            info.disk_number = Some(input.read_dword()?);
        }
        Ok((info, input.position() as usize))
    }

    /// Encodes the record body.
    pub fn encode(&self) -> ZipResult<Vec<u8>> {
        let mut out = DataOutput::buffer();
        if let Some(size) = self.uncompressed_size {
            out.write_qword(size)?;
        }
        if let Some(size) = self.compressed_size {
            out.write_qword(size)?;
        }
        if let Some(offset) = self.header_start {
            out.write_qword(offset)?;
        }
        if let Some(disk) = self.disk_number {
            out.write_dword(disk)?;
        }
        Ok(out.into_inner())
    }

    /// The record a central directory header needs for `file`, if any.
    pub fn for_central(file: &ZipFileData) -> Option<Zip64ExtendedInformation> {
        let info = Zip64ExtendedInformation {
            uncompressed_size: (file.uncompressed_size >= spec::ZIP64_BYTES_THR)
                .then_some(file.uncompressed_size),
            compressed_size: (file.compressed_size >= spec::ZIP64_BYTES_THR)
                .then_some(file.compressed_size),
            header_start: (file.header_start >= spec::ZIP64_BYTES_THR).then_some(file.header_start),
            disk_number: (file.disk_number >= spec::ZIP64_DISK_THR).then_some(file.disk_number),
        };
        (!info.is_empty()).then_some(info)
    }

    /// The record reserved in a local header for both sizes.
    pub fn local_header(uncompressed_size: u64, compressed_size: u64) -> Zip64ExtendedInformation {
        Zip64ExtendedInformation {
            uncompressed_size: Some(uncompressed_size),
            compressed_size: Some(compressed_size),
            header_start: None,
            disk_number: None,
        }
    }

    /// True if there is nothing to encode.
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.header_start.is_none()
            && self.disk_number.is_none()
    }
}
