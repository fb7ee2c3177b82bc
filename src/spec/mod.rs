//! On-disk records of the ZIP format and the constants they share.

mod central_directory_header;
pub use self::central_directory_header::*;
mod data_descriptor;
pub use self::data_descriptor::*;
mod decryption_header;
pub use self::decryption_header::*;
mod end_of_central_directory_record;
pub use self::end_of_central_directory_record::*;
mod local_file_header;
pub use self::local_file_header::*;
mod zip64_end_of_central_directory_locator;
pub use self::zip64_end_of_central_directory_locator::*;
mod zip64_end_of_central_directory_record;
pub use self::zip64_end_of_central_directory_record::*;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x02014b50;
pub const CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE: u32 = 0x07064b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
/// First four bytes of the first volume of a split archive.
pub const SPLIT_ARCHIVE_SIGNATURE: u32 = 0x08074b50;
/// Replaces the split marker when a split session ended on its first volume.
pub const SINGLE_VOLUME_SPLIT_SIGNATURE: u32 = 0x30304b50;

/// A 32-bit size or offset at or above this value lives in a Zip64 record.
pub const ZIP64_BYTES_THR: u64 = u32::MAX as u64;
/// Entry counts at or above this value live in the Zip64 trailer.
pub const ZIP64_ENTRY_THR: u64 = u16::MAX as u64;
/// Disk numbers at or above this value live in a Zip64 record.
pub const ZIP64_DISK_THR: u32 = u16::MAX as u32;

pub const FLAG_ENCRYPTED: u16 = 1;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;
pub const FLAG_UTF8: u16 = 1 << 11;
pub const FLAG_CENTRAL_DIRECTORY_MASKED: u16 = 1 << 13;

/// Saturates a 64-bit value into a 32-bit header field.
pub fn zip64_u32(value: u64) -> u32 {
    if value >= ZIP64_BYTES_THR {
        u32::MAX
    } else {
        value as u32
    }
}

/// Saturates a 32/64-bit count into a 16-bit header field.
pub fn zip64_u16(value: u64) -> u16 {
    if value >= ZIP64_ENTRY_THR {
        u16::MAX
    } else {
        value as u16
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn saturation_starts_at_the_sentinel() {
        assert_eq!(zip64_u32(0xFFFF_FFFE), 0xFFFF_FFFE);
        assert_eq!(zip64_u32(0xFFFF_FFFF), 0xFFFF_FFFF);
        assert_eq!(zip64_u32(1 << 40), 0xFFFF_FFFF);
        assert_eq!(zip64_u16(0xFFFE), 0xFFFE);
        assert_eq!(zip64_u16(0xFFFF), 0xFFFF);
        assert_eq!(zip64_u16(70_000), 0xFFFF);
    }
}
