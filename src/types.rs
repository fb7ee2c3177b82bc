//! Types that specify what is contained in a ZIP.

use crate::compression::CompressionMethod;
use crate::extra_fields::ExtraFields;
use crate::result::{ZipError, ZipResult};
use crate::spec;

/// Version the archives written by this library are made by (6.3).
pub const DEFAULT_VERSION: u8 = 63;

pub(crate) mod ffi {
    pub const S_IFDIR: u32 = 0o0040000;
    pub const S_IFREG: u32 = 0o0100000;
}

/// Host system the file attributes were written on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum System {
    /// MS-DOS and compatible attributes
    Dos = 0,
    /// Unix attributes in the high half of the external attributes
    Unix = 3,
    /// Anything else
    Unknown,
}

impl System {
    /// Decodes the host byte of "version made by".
    pub fn from_u8(system: u8) -> System {
        match system {
            0 => System::Dos,
            3 => System::Unix,
            _ => System::Unknown,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            System::Dos => 0,
            System::Unix => 3,
            // unknown hosts are written back as "made by DOS"
            System::Unknown => 0,
        }
    }
}

/// Representation of a moment in time.
///
/// Zip files use an old format from DOS to store timestamps,
/// with its own set of peculiarities.
/// For example, it has a resolution of 2 seconds!
///
/// A [`DateTime`] can be stored directly in a zipfile with [`FileOptions::last_modified_time`],
/// or read from one with [`ZipFile::last_modified`](crate::read::ZipFile::last_modified)
///
/// [`FileOptions::last_modified_time`]: crate::write::FileOptions::last_modified_time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Default for DateTime {
    /// Constructs an 'default' datetime of 1980-01-01 00:00:00
    fn default() -> DateTime {
        DateTime {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTime {
    /// Converts an msdos (u16, u16) pair to a DateTime object
    pub fn from_msdos(datepart: u16, timepart: u16) -> DateTime {
        let seconds = (timepart & 0b0000000000011111) << 1;
        let minutes = (timepart & 0b0000011111100000) >> 5;
        let hours = (timepart & 0b1111100000000000) >> 11;
        let days = datepart & 0b0000000000011111;
        let months = (datepart & 0b0000000111100000) >> 5;
        let years = (datepart & 0b1111111000000000) >> 9;

        DateTime {
            year: years + 1980,
            month: months as u8,
            day: days as u8,
            hour: hours as u8,
            minute: minutes as u8,
            second: seconds as u8,
        }
    }

    /// Constructs a DateTime from a specific date and time
    ///
    /// The bounds are:
    /// * year: [1980, 2107]
    /// * month: [1, 12]
    /// * day: [1, 31]
    /// * hour: [0, 23]
    /// * minute: [0, 59]
    /// * second: [0, 60]
    pub fn from_date_and_time(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> ZipResult<DateTime> {
        if (1980..=2107).contains(&year)
            && (1..=12).contains(&month)
            && (1..=31).contains(&day)
            && hour <= 23
            && minute <= 59
            && second <= 60
        {
            Ok(DateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
            })
        } else {
            Err(ZipError::InvalidOptions("date and time out of the DOS range"))
        }
    }

    /// Gets the time portion of this datetime in the msdos representation
    pub fn timepart(&self) -> u16 {
        ((self.second as u16) >> 1) | ((self.minute as u16) << 5) | ((self.hour as u16) << 11)
    }

    /// Gets the date portion of this datetime in the msdos representation
    pub fn datepart(&self) -> u16 {
        (self.day as u16) | ((self.month as u16) << 5) | ((self.year - 1980) << 9)
    }

    /// Get the year. There is no epoch, i.e. 2018 will be returned as 2018.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Get the month, where 1 = january and 12 = december
    pub fn month(&self) -> u8 {
        self.month
    }

    /// Get the day
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Get the hour
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Get the minute
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Get the second
    pub fn second(&self) -> u8 {
        self.second
    }
}

/// AES key strength, shared by the AE-x scheme and strong encryption.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AesMode {
    /// 128-bit key
    Aes128,
    /// 192-bit key
    Aes192,
    /// 256-bit key
    Aes256,
}

impl AesMode {
    /// Length of the AE-x salt in bytes.
    pub fn salt_length(&self) -> usize {
        self.key_length() / 2
    }

    /// Length of the key in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            AesMode::Aes128 => 16,
            AesMode::Aes192 => 24,
            AesMode::Aes256 => 32,
        }
    }

    pub(crate) fn strength(&self) -> u8 {
        match self {
            AesMode::Aes128 => 0x01,
            AesMode::Aes192 => 0x02,
            AesMode::Aes256 => 0x03,
        }
    }

    pub(crate) fn from_strength(strength: u8) -> Option<AesMode> {
        match strength {
            0x01 => Some(AesMode::Aes128),
            0x02 => Some(AesMode::Aes192),
            0x03 => Some(AesMode::Aes256),
            _ => None,
        }
    }

    /// Algorithm identifier used by strong encryption headers.
    pub(crate) fn alg_id(&self) -> u16 {
        match self {
            AesMode::Aes128 => 0x660E,
            AesMode::Aes192 => 0x660F,
            AesMode::Aes256 => 0x6610,
        }
    }

    pub(crate) fn from_alg_id(alg_id: u16) -> Option<AesMode> {
        match alg_id {
            0x660E => Some(AesMode::Aes128),
            0x660F => Some(AesMode::Aes192),
            0x6610 => Some(AesMode::Aes256),
            _ => None,
        }
    }

    pub(crate) fn bit_length(&self) -> u16 {
        self.key_length() as u16 * 8
    }
}

/// Version of the AE-x scheme an entry was written with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AesVendorVersion {
    /// AE-1 keeps the CRC-32 of the plaintext
    Ae1,
    /// AE-2 stores a zero CRC-32 and relies on the authentication code
    Ae2,
}

impl AesVendorVersion {
    pub(crate) fn to_u16(self) -> u16 {
        match self {
            AesVendorVersion::Ae1 => 0x0001,
            AesVendorVersion::Ae2 => 0x0002,
        }
    }

    pub(crate) fn from_u16(version: u16) -> Option<AesVendorVersion> {
        match version {
            0x0001 => Some(AesVendorVersion::Ae1),
            0x0002 => Some(AesVendorVersion::Ae2),
            _ => None,
        }
    }
}

/// How the payload of an entry is encrypted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// Not encrypted
    #[default]
    None,
    /// Traditional PKWARE stream cipher
    ZipCrypto,
    /// AE-x: PBKDF2 keys, AES in the zip counter mode, HMAC-SHA1 trailer
    Aes {
        /// Key strength
        mode: AesMode,
        /// Scheme version
        vendor: AesVendorVersion,
    },
    /// PKWARE strong encryption: password-wrapped session key, AES-CBC
    Strong(AesMode),
}

impl EncryptionMethod {
    /// AE-2 with the given strength, as written by this library.
    pub fn aes(mode: AesMode) -> EncryptionMethod {
        EncryptionMethod::Aes {
            mode,
            vendor: AesVendorVersion::Ae2,
        }
    }

    /// False only for `EncryptionMethod::None`.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, EncryptionMethod::None)
    }
}

/// Structure representing a ZIP file.
#[derive(Debug, Clone)]
pub struct ZipFileData {
    /// Compatibility of the file attribute information
    pub system: System,
    /// Format version understood by the creating tool
    pub version_made_by: u8,
    /// General purpose bit flags as stored in the headers
    pub flags: u16,
    /// How the payload is encrypted
    pub encryption: EncryptionMethod,
    /// Compression method used to store the file
    pub compression_method: CompressionMethod,
    /// Last modified time. This will only have a 2 second precision.
    pub last_modified_time: DateTime,
    /// CRC32 checksum
    pub crc32: u32,
    /// Size of the file in the ZIP
    pub compressed_size: u64,
    /// Size of the file when extracted
    pub uncompressed_size: u64,
    /// Name of the file
    pub file_name: String,
    /// Raw file name. To be used when file_name was incorrectly decoded.
    pub file_name_raw: Vec<u8>,
    /// File comment
    pub file_comment: String,
    /// Raw file comment
    pub file_comment_raw: Vec<u8>,
    /// Offset of the local header, relative to the start of its disk
    pub header_start: u64,
    /// Disk the local header is on
    pub disk_number: u32,
    /// Internal file attributes
    pub internal_attributes: u16,
    /// External file attributes
    pub external_attributes: u32,
    /// Extra records of the central directory header, Zip64 record excluded
    pub extra_field: ExtraFields,
    /// The local header reserves a Zip64 record
    pub large_file: bool,
    /// Version needed to extract, as read from the central directory
    pub version_to_extract: Option<u16>,
}

impl ZipFileData {
    pub(crate) fn new(file_name: String) -> ZipFileData {
        let file_name_raw = file_name.clone().into_bytes();
        ZipFileData {
            system: System::Unix,
            version_made_by: DEFAULT_VERSION,
            flags: 0,
            encryption: EncryptionMethod::None,
            compression_method: CompressionMethod::Stored,
            last_modified_time: DateTime::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name,
            file_name_raw,
            file_comment: String::new(),
            file_comment_raw: Vec::new(),
            header_start: 0,
            disk_number: 0,
            internal_attributes: 0,
            external_attributes: 0,
            extra_field: ExtraFields::default(),
            large_file: false,
            version_to_extract: None,
        }
    }

    /// Directories are entries whose name ends with a slash.
    pub fn is_dir(&self) -> bool {
        self.file_name.ends_with('/') || self.file_name.ends_with('\\')
    }

    /// True if a data descriptor follows the payload (general purpose bit 3).
    pub fn uses_data_descriptor(&self) -> bool {
        self.flags & spec::FLAG_DATA_DESCRIPTOR != 0
    }

    /// Name and comment are UTF-8 (general purpose bit 11).
    pub fn is_utf8(&self) -> bool {
        self.flags & spec::FLAG_UTF8 != 0
    }

    /// Method code written to the headers; AES entries announce method 99.
    pub fn header_compression_method(&self) -> u16 {
        match self.encryption {
            EncryptionMethod::Aes { .. } => CompressionMethod::AES_METHOD,
            _ => self.compression_method.to_u16(),
        }
    }

    /// "Version made by" as the 16-bit header field.
    pub fn version_made_by_field(&self) -> u16 {
        (self.system.to_u8() as u16) << 8 | self.version_made_by as u16
    }

    /// Lowest format version that can extract this entry.
    pub fn version_needed(&self) -> u16 {
        if let Some(version) = self.version_to_extract {
            return if self.needs_zip64() { version.max(45) } else { version };
        }
        let mut version = 10;
        if self.compression_method != CompressionMethod::Stored
            || self.is_dir()
            || self.encryption == EncryptionMethod::ZipCrypto
        {
            version = 20;
        }
        if self.large_file || self.needs_zip64() {
            version = version.max(45);
        }
        // both AES families need 5.1
        if matches!(self.encryption, EncryptionMethod::Strong(_) | EncryptionMethod::Aes { .. }) {
            version = version.max(51);
        }
        version
    }

    /// True if any header field of this entry has to move to a Zip64 record.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= spec::ZIP64_BYTES_THR
            || self.uncompressed_size >= spec::ZIP64_BYTES_THR
            || self.header_start >= spec::ZIP64_BYTES_THR
            || self.disk_number >= spec::ZIP64_DISK_THR
    }

    /// Get unix mode for the file
    pub fn unix_mode(&self) -> Option<u32> {
        match self.system {
            System::Unix => Some(self.external_attributes >> 16),
            System::Dos => {
                // Interpret MSDOS directory bit
                let mut mode = if 0x10 == (self.external_attributes & 0x10) {
                    ffi::S_IFDIR | 0o0775
                } else {
                    ffi::S_IFREG | 0o0664
                };
                if 0x01 == (self.external_attributes & 0x01) {
                    // Read-only bit; strip write permissions
                    mode &= 0o0555;
                }
                Some(mode)
            }
            System::Unknown => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn system() {
        assert_eq!(System::Dos as u16, 0u16);
        assert_eq!(System::Unix as u16, 3u16);
        assert_eq!(System::from_u8(0), System::Dos);
        assert_eq!(System::from_u8(3), System::Unix);
    }

    #[test]
    fn datetime_default() {
        let dt = DateTime::default();
        assert_eq!(dt.timepart(), 0);
        assert_eq!(dt.datepart(), 0b0000000_0001_00001);
    }

    #[test]
    fn datetime_max() {
        let dt = DateTime::from_date_and_time(2107, 12, 31, 23, 59, 60).unwrap();
        assert_eq!(dt.timepart(), 0b10111_111011_11110);
        assert_eq!(dt.datepart(), 0b1111111_1100_11111);
    }

    #[test]
    fn datetime_bounds() {
        assert!(DateTime::from_date_and_time(2000, 1, 1, 23, 59, 60).is_ok());
        assert!(DateTime::from_date_and_time(2000, 1, 1, 24, 0, 0).is_err());
        assert!(DateTime::from_date_and_time(2000, 1, 1, 0, 60, 0).is_err());
        assert!(DateTime::from_date_and_time(2000, 1, 1, 0, 0, 61).is_err());
        assert!(DateTime::from_date_and_time(2107, 12, 32, 0, 0, 0).is_err());
        assert!(DateTime::from_date_and_time(1979, 1, 1, 0, 0, 0).is_err());
        assert!(DateTime::from_date_and_time(2108, 12, 31, 0, 0, 0).is_err());
    }

    #[test]
    fn datetime_msdos_round_trip() {
        let dt = DateTime::from_date_and_time(2018, 8, 15, 20, 45, 6).unwrap();
        let back = DateTime::from_msdos(dt.datepart(), dt.timepart());
        assert_eq!(dt, back);
        assert_eq!(back.year(), 2018);
        assert_eq!(back.second(), 6);
    }

    #[test]
    fn aes_mode_lengths() {
        assert_eq!(AesMode::Aes128.salt_length(), 8);
        assert_eq!(AesMode::Aes192.salt_length(), 12);
        assert_eq!(AesMode::Aes256.salt_length(), 16);
        assert_eq!(AesMode::from_strength(3), Some(AesMode::Aes256));
        assert_eq!(AesMode::from_alg_id(0x660F), Some(AesMode::Aes192));
        assert_eq!(AesMode::Aes256.bit_length(), 256);
    }

    #[test]
    fn zip64_threshold_uses_sentinel() {
        let mut data = ZipFileData::new("big".to_string());
        data.uncompressed_size = 0xFFFF_FFFE;
        assert!(!data.needs_zip64());
        data.uncompressed_size = 0xFFFF_FFFF;
        assert!(data.needs_zip64());
    }

    #[test]
    fn version_needed_tracks_features() {
        let mut data = ZipFileData::new("a.txt".to_string());
        assert_eq!(data.version_needed(), 10);
        data.compression_method = CompressionMethod::Deflated;
        assert_eq!(data.version_needed(), 20);
        data.large_file = true;
        assert_eq!(data.version_needed(), 45);
        data.encryption = EncryptionMethod::aes(AesMode::Aes256);
        assert_eq!(data.version_needed(), 51);
        assert_eq!(data.header_compression_method(), 99);
        data.encryption = EncryptionMethod::Strong(AesMode::Aes128);
        assert_eq!(data.version_needed(), 51);
    }
}
