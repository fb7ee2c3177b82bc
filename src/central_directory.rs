//! Reading and writing the central directory and the trailer records after it.

use std::io::prelude::*;
use std::io::SeekFrom;

use crate::codec::{Charset, DataInput, DataOutput};
use crate::compression::CompressionMethod;
use crate::crypto::strong;
use crate::extra_fields::{ExtraFields, Zip64ExtendedInformation, Zip64Fields};
use crate::model::ZipModel;
use crate::result::{ZipError, ZipResult};
use crate::spec::{
    self, CentralDirectoryEncryption, CentralDirectoryEnd, CentralDirectoryHeader,
    Zip64CentralDirectoryEnd, Zip64CentralDirectoryEndLocator,
};
use crate::split::VolumeSink;
use crate::types::{AesMode, DateTime, EncryptionMethod, System, ZipFileData, DEFAULT_VERSION};
use crate::volume::VolumeMap;

/// Version needed by a Zip64 end record that describes an encrypted central directory.
const ENCRYPTED_DIRECTORY_VERSION: u16 = 62;
const ZIP64_VERSION: u16 = 45;

/// Where the central directory lives and how many entries it has, with the
/// 16/32-bit trailer fields already widened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentralDirectory {
    /// Disk the trailer is on
    pub disk_number: u32,
    /// Disk the central directory starts on
    pub disk_with_central_directory: u32,
    /// Central directory headers on the trailer disk
    pub number_of_files_on_this_disk: u64,
    /// Central directory headers in total
    pub number_of_files: u64,
    /// Size of the central directory in bytes, as stored
    pub size: u64,
    /// Offset of the central directory, relative to its disk
    pub offset: u64,
}

impl CentralDirectory {
    fn from_end(end: &CentralDirectoryEnd) -> CentralDirectory {
        CentralDirectory {
            disk_number: end.disk_number as u32,
            disk_with_central_directory: end.disk_with_central_directory as u32,
            number_of_files_on_this_disk: end.number_of_files_on_this_disk as u64,
            number_of_files: end.number_of_files as u64,
            size: end.central_directory_size as u64,
            offset: end.central_directory_offset as u64,
        }
    }

    fn from_zip64(end: &Zip64CentralDirectoryEnd) -> CentralDirectory {
        CentralDirectory {
            disk_number: end.disk_number,
            disk_with_central_directory: end.disk_with_central_directory,
            number_of_files_on_this_disk: end.number_of_files_on_this_disk,
            number_of_files: end.number_of_files,
            size: end.central_directory_size,
            offset: end.central_directory_offset,
        }
    }
}

fn widen(field: u32, zip64: Option<u64>) -> ZipResult<u64> {
    if field != u32::MAX {
        return Ok(field as u64);
    }
    zip64.ok_or(ZipError::MalformedRecord(
        "header field holds the zip64 sentinel but no zip64 value follows",
    ))
}

/// Builds the central directory header of `file`, moving values that do not
/// fit their field into a Zip64 record.
pub(crate) fn encode_header(file: &ZipFileData) -> ZipResult<CentralDirectoryHeader> {
    let zip64 = Zip64ExtendedInformation::for_central(file);
    let disk_number_start = if file.disk_number >= spec::ZIP64_DISK_THR {
        u16::MAX
    } else {
        file.disk_number as u16
    };
    Ok(CentralDirectoryHeader {
        version_made_by: file.version_made_by_field(),
        version_needed: file.version_needed(),
        flags: file.flags,
        compression_method: file.header_compression_method(),
        last_mod_time: file.last_modified_time.timepart(),
        last_mod_date: file.last_modified_time.datepart(),
        crc32: file.crc32,
        compressed_size: spec::zip64_u32(file.compressed_size),
        uncompressed_size: spec::zip64_u32(file.uncompressed_size),
        disk_number_start,
        internal_file_attrs: file.internal_attributes,
        external_file_attrs: file.external_attributes,
        local_header_offset: spec::zip64_u32(file.header_start),
        file_name: file.file_name_raw.clone(),
        extra_field: file.extra_field.with_zip64(zip64).encode()?,
        file_comment: file.file_comment_raw.clone(),
    })
}

/// Turns a parsed central directory header into an entry.
pub(crate) fn decode_header(header: CentralDirectoryHeader, charset: Charset) -> ZipResult<ZipFileData> {
    let text_charset = if header.flags & spec::FLAG_UTF8 != 0 {
        Charset::Utf8
    } else {
        charset
    };
    let mut extra_field = ExtraFields::parse(&header.extra_field, Zip64Fields::from_central(&header))?;
    let zip64 = extra_field.take_zip64().unwrap_or_default();

    let uncompressed_size = widen(header.uncompressed_size, zip64.uncompressed_size)?;
    let compressed_size = widen(header.compressed_size, zip64.compressed_size)?;
    let header_start = widen(header.local_header_offset, zip64.header_start)?;
    let disk_number = if header.disk_number_start == u16::MAX {
        zip64.disk_number.ok_or(ZipError::MalformedRecord(
            "disk number holds the zip64 sentinel but no zip64 value follows",
        ))?
    } else {
        header.disk_number_start as u32
    };

    let (compression_method, encryption) = if header.compression_method == CompressionMethod::AES_METHOD {
        let aes = extra_field
            .aes()
            .ok_or(ZipError::MalformedRecord("AES entry without an AES extra record"))?;
        (
            aes.compression_method,
            EncryptionMethod::Aes {
                mode: aes.mode,
                vendor: aes.vendor_version,
            },
        )
    } else if header.flags & spec::FLAG_ENCRYPTED == 0 {
        (
            CompressionMethod::from_u16(header.compression_method),
            EncryptionMethod::None,
        )
    } else if header.flags & spec::FLAG_STRONG_ENCRYPTION != 0 {
        let mode = extra_field
            .strong_encryption()
            .and_then(|field| field.mode())
            .ok_or(ZipError::UnsupportedArchive(
                "strong encryption with an unsupported algorithm",
            ))?;
        (
            CompressionMethod::from_u16(header.compression_method),
            EncryptionMethod::Strong(mode),
        )
    } else {
        (
            CompressionMethod::from_u16(header.compression_method),
            EncryptionMethod::ZipCrypto,
        )
    };

    let file = ZipFileData {
        system: System::from_u8((header.version_made_by >> 8) as u8),
        version_made_by: header.version_made_by as u8,
        flags: header.flags,
        encryption,
        compression_method,
        last_modified_time: DateTime::from_msdos(header.last_mod_date, header.last_mod_time),
        crc32: header.crc32,
        compressed_size,
        uncompressed_size,
        file_name: text_charset.decode(&header.file_name),
        file_name_raw: header.file_name,
        file_comment: text_charset.decode(&header.file_comment),
        file_comment_raw: header.file_comment,
        header_start,
        disk_number,
        internal_attributes: header.internal_file_attrs,
        external_attributes: header.external_file_attrs,
        extra_field,
        large_file: false,
        version_to_extract: Some(header.version_needed),
    };
    tracing::trace!(
        name = %file.file_name,
        disk_number,
        header_start,
        compressed_size,
        "read central directory header"
    );
    Ok(file)
}

fn read_trailer<R: Read + Seek>(
    reader: &mut R,
) -> ZipResult<(CentralDirectoryEnd, Option<Zip64CentralDirectoryEndLocator>)> {
    let (end, end_offset) = CentralDirectoryEnd::find_and_parse(reader)?;

    let mut locator = None;
    if end_offset >= Zip64CentralDirectoryEndLocator::LEN {
        reader.seek(SeekFrom::Start(end_offset - Zip64CentralDirectoryEndLocator::LEN))?;
        let mut bytes = [0u8; Zip64CentralDirectoryEndLocator::LEN as usize];
        reader.read_exact(&mut bytes)?;
        locator = Zip64CentralDirectoryEndLocator::parse_if_present(&bytes)?;
    }
    Ok((end, locator))
}

fn disks_in_trailer(end: &CentralDirectoryEnd, locator: Option<&Zip64CentralDirectoryEndLocator>) -> u64 {
    match locator {
        Some(locator) => (locator.number_of_disks as u64).max(1),
        None => end.disk_number as u64 + 1,
    }
}

/// Number of volumes the trailer at the end of `reader` says the archive has.
pub(crate) fn number_of_disks<R: Read + Seek>(reader: &mut R) -> ZipResult<u64> {
    let (end, locator) = read_trailer(reader)?;
    Ok(disks_in_trailer(&end, locator.as_ref()))
}

/// Locates the trailer of the archive in `reader` and loads its central directory.
///
/// `map` describes how `reader` is split into volumes. An encrypted central
/// directory needs `password`.
pub(crate) fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    map: &VolumeMap,
    password: Option<&[u8]>,
    charset: Charset,
) -> ZipResult<ZipModel> {
    let (end, locator) = read_trailer(reader)?;
    map.expect_volumes(disks_in_trailer(&end, locator.as_ref()))?;

    let zip64_end = match locator {
        Some(locator) => {
            let offset = map.absolute(
                locator.disk_with_central_directory,
                locator.end_of_central_directory_offset,
            )?;
            reader.seek(SeekFrom::Start(offset))?;
            let record = Zip64CentralDirectoryEnd::read(&mut DataInput::at(&mut *reader, offset))?;
            tracing::debug!(offset, "found zip64 end of central directory record");
            Some(record)
        }
        None => None,
    };
    let directory = match &zip64_end {
        Some(record) => CentralDirectory::from_zip64(record),
        None => CentralDirectory::from_end(&end),
    };

    let start = map.absolute(directory.disk_with_central_directory, directory.offset)?;
    reader.seek(SeekFrom::Start(start))?;
    let mut raw = Vec::new();
    reader.by_ref().take(directory.size).read_to_end(&mut raw)?;
    if raw.len() as u64 != directory.size {
        return Err(ZipError::MalformedRecord(
            "central directory extends past the end of the archive",
        ));
    }

    let encryption = match &zip64_end {
        Some(record) if record.version_needed_to_extract & 0xff >= ENCRYPTED_DIRECTORY_VERSION => {
            Some(CentralDirectoryEncryption::parse(&record.extensible_data)?)
        }
        _ => None,
    };
    if let Some(info) = &encryption {
        let password = password.ok_or(ZipError::PasswordRequired)?;
        if info.compression_method != 0 {
            return Err(ZipError::UnsupportedArchive(
                "compressed central directories are not supported",
            ));
        }
        raw = strong::decrypt_central_directory(&raw, password, info.original_size)?;
        tracing::debug!(
            compressed_size = info.compressed_size,
            original_size = info.original_size,
            "decrypted central directory"
        );
    }

    let split_size = (map.len() > 1).then(|| map.volumes()[0].length);
    let mut model = ZipModel::new(split_size, charset);
    let mut input = DataInput::new(&raw[..]);
    for _ in 0..directory.number_of_files {
        let header = CentralDirectoryHeader::read(&mut input)?;
        model.push(decode_header(header, charset)?);
    }
    if zip64_end.is_some() {
        model.note_zip64();
    }
    model.set_comment(end.zip_file_comment);
    model.central_directory = directory;
    model.encryption = encryption;
    Ok(model)
}

/// Writes the central directory of `model` followed by the trailer records.
///
/// With `encryption` set, the whole central directory is written as one
/// strongly encrypted payload described by a Zip64 end record.
pub(crate) fn write_central_directory<S: VolumeSink>(
    sink: &mut S,
    model: &mut ZipModel,
    encryption: Option<(&[u8], AesMode)>,
) -> ZipResult<()> {
    let mut header_disks = Vec::with_capacity(model.len());
    let mut size = 0;
    let mut info = None;

    // a full volume is left before the directory start is taken
    sink.reserve(0)?;
    let mut start = (sink.disk_number(), sink.position());
    match encryption {
        None => {
            for (index, file) in model.files().iter().enumerate() {
                let bytes = encode_header(file)?.encode()?;
                let at = sink.write_guarded(&bytes)?;
                if index == 0 {
                    start = at;
                }
                header_disks.push(at.0);
                size += bytes.len() as u64;
            }
        }
        Some((password, mode)) => {
            let mut plain = DataOutput::buffer();
            plain.mark("headers");
            for file in model.files() {
                encode_header(file)?.write(&mut plain)?;
            }
            let original_size = plain.bytes_since_mark("headers")?;
            let plain = plain.into_inner();
            let data = strong::encrypt_central_directory(&plain, password, mode)?;
            sink.write_all(&data)?;
            header_disks.resize(model.len(), start.0);
            size = data.len() as u64;
            info = Some(CentralDirectoryEncryption {
                compression_method: 0,
                compressed_size: size,
                original_size,
                alg_id: mode.alg_id(),
                bit_length: mode.bit_length(),
                flags: 0x0001,
                hash_id: 0,
                hash: Vec::new(),
            });
        }
    }
    let (disk_with_central_directory, offset) = start;

    let extensible_data = match &info {
        Some(info) => info.encode()?,
        None => Vec::new(),
    };
    let comment = model.comment().to_vec();
    let trailer_len = 56
        + extensible_data.len() as u64
        + Zip64CentralDirectoryEndLocator::LEN
        + CentralDirectoryEnd::FIXED_SIZE
        + comment.len() as u64;
    sink.reserve(trailer_len)?;

    let disk = sink.disk_number();
    model.central_directory = CentralDirectory {
        disk_number: disk,
        disk_with_central_directory,
        number_of_files_on_this_disk: header_disks.iter().filter(|d| **d == disk).count() as u64,
        number_of_files: model.len() as u64,
        size,
        offset,
    };
    model.encryption = info;
    let directory = model.central_directory.clone();

    if model.requires_zip64_trailer() {
        let record = Zip64CentralDirectoryEnd {
            version_made_by: (System::Unix as u16) << 8 | DEFAULT_VERSION as u16,
            version_needed_to_extract: if model.encryption.is_some() {
                ENCRYPTED_DIRECTORY_VERSION
            } else {
                ZIP64_VERSION
            },
            disk_number: directory.disk_number,
            disk_with_central_directory: directory.disk_with_central_directory,
            number_of_files_on_this_disk: directory.number_of_files_on_this_disk,
            number_of_files: directory.number_of_files,
            central_directory_size: directory.size,
            central_directory_offset: directory.offset,
            extensible_data,
        };
        let (record_disk, record_offset) = sink.write_guarded(&record.encode()?)?;
        let locator = Zip64CentralDirectoryEndLocator {
            disk_with_central_directory: record_disk,
            end_of_central_directory_offset: record_offset,
            number_of_disks: disk + 1,
        };
        let mut out = DataOutput::buffer();
        locator.write(&mut out)?;
        sink.write_guarded(&out.into_inner())?;
        tracing::debug!(
            entries = directory.number_of_files,
            offset = record_offset,
            "wrote zip64 end of central directory record"
        );
    }

    let end = CentralDirectoryEnd {
        disk_number: spec::zip64_u16(directory.disk_number as u64),
        disk_with_central_directory: spec::zip64_u16(directory.disk_with_central_directory as u64),
        number_of_files_on_this_disk: spec::zip64_u16(directory.number_of_files_on_this_disk),
        number_of_files: spec::zip64_u16(directory.number_of_files),
        central_directory_size: spec::zip64_u32(directory.size),
        central_directory_offset: spec::zip64_u32(directory.offset),
        zip_file_comment: comment,
    };
    sink.write_guarded(&end.encode()?)?;
    Ok(())
}
