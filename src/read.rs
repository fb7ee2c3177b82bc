//! Structs for reading a ZIP archive

use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::mem;
use std::path::Path;

use crate::central_directory::{number_of_disks, read_central_directory};
use crate::codec::{Charset, DataInput};
use crate::compression::{CompressionMethod, Decompressor};
use crate::crc32::Crc32Reader;
use crate::crypto::CryptoReader;
use crate::extra_fields::{ExtraFields, Zip64Fields};
use crate::model::ZipModel;
use crate::result::{ZipError, ZipResult};
use crate::spec::LocalFileHeader;
use crate::types::{AesVendorVersion, DateTime, EncryptionMethod, ZipFileData};
use crate::volume::{VolumeMap, VolumeReader};

/// Wrapper for reading the contents of a ZIP file.
///
/// ```
/// fn doit() -> zip_volumes::result::ZipResult<()> {
///     use std::io::prelude::*;
///
///     let mut buf = std::io::Cursor::new(Vec::new());
///     let mut writer = zip_volumes::ZipWriter::new(&mut buf);
///     writer.start_file("hello.txt", zip_volumes::write::FileOptions::default())?;
///     writer.write_all(b"Hello, World!")?;
///     writer.finish()?;
///     drop(writer);
///
///     let mut zip = zip_volumes::ZipArchive::new(buf)?;
///     for i in 0..zip.len() {
///         let mut file = zip.by_index(i)?;
///         println!("Filename: {}", file.name());
///         let mut contents = String::new();
///         file.read_to_string(&mut contents)?;
///         assert_eq!(contents, "Hello, World!");
///     }
///     Ok(())
/// }
///
/// doit().unwrap();
/// ```
#[derive(Debug)]
pub struct ZipArchive<R: Read + Seek> {
    reader: R,
    model: ZipModel,
    map: VolumeMap,
}

enum ZipFileReader<'a> {
    NoReader,
    Raw(io::Take<&'a mut dyn Read>),
    Unopened(io::Take<&'a mut dyn Read>),
    Decoded(Box<Crc32Reader<Decompressor<CryptoReader<io::Take<&'a mut dyn Read>>>>>),
}

/// A struct for reading a zip file
pub struct ZipFile<'a> {
    data: &'a ZipFileData,
    local_header: LocalFileHeader,
    reader: ZipFileReader<'a>,
}

fn make_reader<'a>(
    reader: io::Take<&'a mut dyn Read>,
    data: &ZipFileData,
    password: Option<&[u8]>,
) -> ZipResult<ZipFileReader<'a>> {
    let crypto = CryptoReader::new(reader, data, password)?;
    let decompressor = Decompressor::new(data.compression_method, crypto)?;
    let verify_crc = !matches!(
        data.encryption,
        EncryptionMethod::Aes {
            vendor: AesVendorVersion::Ae2,
            ..
        }
    );
    Ok(ZipFileReader::Decoded(Box::new(Crc32Reader::new(
        decompressor,
        data.crc32,
        data.uncompressed_size,
        verify_crc,
    ))))
}

impl ZipArchive<VolumeReader> {
    /// Opens the archive whose last (or only) volume is `path`.
    ///
    /// Numbered volumes next to it (`.z01`, `.z02`, ...) are picked up
    /// automatically.
    pub fn open<P: AsRef<Path>>(path: P) -> ZipResult<ZipArchive<VolumeReader>> {
        Self::open_with_password(path, None)
    }

    /// Like [`ZipArchive::open`], for archives whose central directory is encrypted.
    pub fn open_with_password<P: AsRef<Path>>(
        path: P,
        password: Option<&[u8]>,
    ) -> ZipResult<ZipArchive<VolumeReader>> {
        let mut map = VolumeMap::discover(path)?;
        map.retain_disks(number_of_disks(&mut VolumeReader::new(map.clone()))?);
        let mut reader = VolumeReader::new(map.clone());
        let model = read_central_directory(&mut reader, &map, password, Charset::default())?;
        Ok(ZipArchive { reader, model, map })
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Opens a Zip archive and parses the central directory
    pub fn new(reader: R) -> ZipResult<ZipArchive<R>> {
        Self::with_options(reader, None, Charset::default())
    }

    /// Opens an archive whose central directory is encrypted with `password`.
    pub fn with_password(reader: R, password: &[u8]) -> ZipResult<ZipArchive<R>> {
        Self::with_options(reader, Some(password), Charset::default())
    }

    /// Opens an archive whose names without the UTF-8 flag use `charset`.
    pub fn with_charset(reader: R, charset: Charset) -> ZipResult<ZipArchive<R>> {
        Self::with_options(reader, None, charset)
    }

    fn with_options(mut reader: R, password: Option<&[u8]>, charset: Charset) -> ZipResult<ZipArchive<R>> {
        let length = reader.seek(SeekFrom::End(0))?;
        let map = VolumeMap::single(length);
        let model = read_central_directory(&mut reader, &map, password, charset)?;
        Ok(ZipArchive { reader, model, map })
    }

    /// Number of files contained in this zip.
    pub fn len(&self) -> usize {
        self.model.len()
    }

    /// Whether this zip archive contains no files
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Get the comment of the zip archive.
    pub fn comment(&self) -> &[u8] {
        self.model.comment()
    }

    /// Returns an iterator over all the file and directory names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.model.files().iter().map(|file| file.file_name.as_str())
    }

    /// Get the index of a file entry by name, if it's present.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.model.index_for_name(name)
    }

    /// Entries and trailer values of this archive.
    pub fn model(&self) -> &ZipModel {
        &self.model
    }

    /// Volumes this archive is read from.
    pub fn volumes(&self) -> &VolumeMap {
        &self.map
    }

    /// Search for a file entry by name
    pub fn by_name(&mut self, name: &str) -> ZipResult<ZipFile<'_>> {
        let index = self.index_for_name(name).ok_or(ZipError::FileNotFound)?;
        self.by_index(index)
    }

    /// Search for an encrypted file entry by name and decrypt it with `password`.
    ///
    /// The password is checked before this returns.
    pub fn by_name_decrypt(&mut self, name: &str, password: &[u8]) -> ZipResult<ZipFile<'_>> {
        let index = self.index_for_name(name).ok_or(ZipError::FileNotFound)?;
        self.by_index_decrypt(index, password)
    }

    /// Search for a file entry by name, returning its stored bytes.
    pub fn by_name_raw(&mut self, name: &str) -> ZipResult<ZipFile<'_>> {
        let index = self.index_for_name(name).ok_or(ZipError::FileNotFound)?;
        self.by_index_raw(index)
    }

    /// Get a contained file by index
    pub fn by_index(&mut self, file_index: usize) -> ZipResult<ZipFile<'_>> {
        self.by_index_with_options(file_index, None, false)
    }

    /// Get a contained encrypted file by index and decrypt it with `password`.
    pub fn by_index_decrypt(&mut self, file_index: usize, password: &[u8]) -> ZipResult<ZipFile<'_>> {
        self.by_index_with_options(file_index, Some(password), false)
    }

    /// Get a contained file by index without decompressing or decrypting it.
    pub fn by_index_raw(&mut self, file_index: usize) -> ZipResult<ZipFile<'_>> {
        self.by_index_with_options(file_index, None, true)
    }

    fn by_index_with_options(
        &mut self,
        file_index: usize,
        password: Option<&[u8]>,
        raw: bool,
    ) -> ZipResult<ZipFile<'_>> {
        let data = self.model.file(file_index).ok_or(ZipError::FileNotFound)?;
        if !raw {
            if let CompressionMethod::Unsupported(_) = data.compression_method {
                return Err(ZipError::UnsupportedArchive("Compression method not supported"));
            }
            if data.encryption.is_encrypted() && password.is_none() {
                return Err(ZipError::PasswordRequired);
            }
        }

        let start = self.map.absolute(data.disk_number, data.header_start)?;
        self.reader.seek(SeekFrom::Start(start))?;
        let local_header = LocalFileHeader::read(&mut DataInput::at(&mut self.reader, start))?;
        tracing::trace!(
            name = %data.file_name,
            header_start = start,
            data_start = start + local_header.len(),
            "opened local file header"
        );

        let limit_reader = (&mut self.reader as &mut dyn Read).take(data.compressed_size);
        let reader = if raw {
            ZipFileReader::Raw(limit_reader)
        } else if data.encryption.is_encrypted() {
            make_reader(limit_reader, data, password)?
        } else {
            ZipFileReader::Unopened(limit_reader)
        };
        Ok(ZipFile {
            data,
            local_header,
            reader,
        })
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Methods for retrieving information on zip files
impl<'a> ZipFile<'a> {
    fn open(&mut self) -> ZipResult<()> {
        self.reader = match mem::replace(&mut self.reader, ZipFileReader::NoReader) {
            ZipFileReader::Unopened(reader) => make_reader(reader, self.data, None)?,
            other => other,
        };
        Ok(())
    }

    /// Get the version of the file
    pub fn version_made_by(&self) -> (u8, u8) {
        (
            self.data.version_made_by / 10,
            self.data.version_made_by % 10,
        )
    }
    /// Get the name of the file
    pub fn name(&self) -> &str {
        &self.data.file_name
    }
    /// Get the name of the file, in the raw (internal) byte representation.
    pub fn name_raw(&self) -> &[u8] {
        &self.data.file_name_raw
    }
    /// Get the comment of the file
    pub fn comment(&self) -> &str {
        &self.data.file_comment
    }
    /// Get the compression method used to store the file
    pub fn compression(&self) -> CompressionMethod {
        self.data.compression_method
    }
    /// Get how the file is encrypted
    pub fn encryption(&self) -> EncryptionMethod {
        self.data.encryption
    }
    /// Get the size of the file in the archive
    pub fn compressed_size(&self) -> u64 {
        self.data.compressed_size
    }
    /// Get the size of the file when uncompressed
    pub fn size(&self) -> u64 {
        self.data.uncompressed_size
    }
    /// Get the time the file was last modified
    pub fn last_modified(&self) -> DateTime {
        self.data.last_modified_time
    }
    /// Returns whether the file is actually a directory
    pub fn is_dir(&self) -> bool {
        self.data.is_dir()
    }
    /// Get unix mode for the file
    pub fn unix_mode(&self) -> Option<u32> {
        self.data.unix_mode()
    }
    /// Get the CRC32 hash of the original file
    pub fn crc32(&self) -> u32 {
        self.data.crc32
    }
    /// Get the offset of the local header, relative to the start of its disk
    pub fn header_start(&self) -> u64 {
        self.data.header_start
    }
    /// Get the disk the local header is on
    pub fn disk_number(&self) -> u32 {
        self.data.disk_number
    }
    /// Get the extra records of the central directory header
    pub fn extra_field(&self) -> &ExtraFields {
        &self.data.extra_field
    }
    /// True if the local header reserves a Zip64 record for the sizes
    pub fn has_zip64_local_header(&self) -> bool {
        ExtraFields::parse(
            &self.local_header.extra_field,
            Zip64Fields::from_local(&self.local_header),
        )
        .map(|mut fields| fields.take_zip64().is_some())
        .unwrap_or(false)
    }

    pub(crate) fn data(&self) -> &ZipFileData {
        self.data
    }

    pub(crate) fn local_header(&self) -> &LocalFileHeader {
        &self.local_header
    }

    /// Switches an untouched entry to yield its stored bytes.
    pub(crate) fn make_raw(&mut self) -> ZipResult<()> {
        self.reader = match mem::replace(&mut self.reader, ZipFileReader::NoReader) {
            ZipFileReader::Raw(reader) | ZipFileReader::Unopened(reader) => ZipFileReader::Raw(reader),
            other => {
                self.reader = other;
                return Err(ZipError::InvalidOptions(
                    "only entries that were not decoded can be copied raw",
                ));
            }
        };
        Ok(())
    }

    fn is_aes(&self) -> bool {
        matches!(self.data.encryption, EncryptionMethod::Aes { .. })
    }
}

/// Reads what is left of the ciphertext so the authentication code gets checked.
fn drain_ciphertext<R: Read>(reader: &mut Crc32Reader<Decompressor<CryptoReader<R>>>) -> io::Result<u64> {
    io::copy(reader.get_mut().get_mut(), &mut io::sink())
}


impl<'a> Read for ZipFile<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.open()?;
        let is_aes = self.is_aes();
        match &mut self.reader {
            ZipFileReader::NoReader | ZipFileReader::Unopened(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "ZipFileReader was in an invalid state",
            )),
            ZipFileReader::Raw(reader) => reader.read(buf),
            ZipFileReader::Decoded(reader) if is_aes => match reader.read(buf) {
                // the decoder may stop before the last ciphertext byte
                Ok(0) if !buf.is_empty() => {
                    drain_ciphertext(&mut **reader)?;
                    Ok(0)
                }
                Ok(count) => Ok(count),
                Err(err) => {
                    let err = ZipError::from(err);
                    if matches!(err, ZipError::AuthenticationFailed) {
                        return Err(err.into());
                    }
                    match drain_ciphertext(&mut **reader).map_err(ZipError::from) {
                        Err(ZipError::AuthenticationFailed) => Err(ZipError::AuthenticationFailed.into()),
                        _ => Err(err.into()),
                    }
                }
            },
            ZipFileReader::Decoded(reader) => reader.read(buf),
        }
    }
}
