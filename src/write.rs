//! Structs for creating a new zip archive

use std::io;
use std::io::prelude::*;
use std::mem;
use std::path::Path;

use crc32fast::Hasher;

use crate::central_directory::write_central_directory;
use crate::codec::DataOutput;
use crate::compression::{CompressionMethod, Compressor};
use crate::crypto::CryptoWriter;
use crate::extra_fields::{AesExtraField, ExtraField, StrongEncryptionField, Zip64ExtendedInformation};
use crate::model::ZipModel;
use crate::read::ZipFile;
use crate::result::{ZipError, ZipResult};
use crate::spec::{self, DataDescriptor, LocalFileHeader};
use crate::split::{SingleVolume, SplitWriter, VolumeSink};
use crate::types::{ffi, AesMode, AesVendorVersion, DateTime, EncryptionMethod, ZipFileData};

enum GenericZipWriter<S: VolumeSink> {
    Closed,
    Storer(S),
    Entry(Compressor<CryptoWriter<S>>),
}

/// Generator for ZIP files.
///
/// ```
/// fn doit() -> zip_volumes::result::ZipResult<()> {
///     use std::io::Write;
///
///     // For this example we write to a buffer, but normally you should use a File
///     let mut buf = [0u8; 65536];
///     let w = std::io::Cursor::new(&mut buf[..]);
///     let mut zip = zip_volumes::ZipWriter::new(w);
///
///     let options = zip_volumes::write::FileOptions::default()
///         .compression_method(zip_volumes::CompressionMethod::Stored);
///     zip.start_file("hello_world.txt", options)?;
///     zip.write_all(b"Hello, World!")?;
///
///     // Optionally finish the zip. (this is also done on drop)
///     zip.finish()?;
///
///     Ok(())
/// }
///
/// println!("Result: {:?}", doit().unwrap());
/// ```
pub struct ZipWriter<S: VolumeSink> {
    inner: GenericZipWriter<S>,
    model: ZipModel,
    stats: ZipWriterStats,
    writing_to_file: bool,
    central_directory_key: Option<(Vec<u8>, AesMode)>,
}

#[derive(Default)]
struct ZipWriterStats {
    hasher: Hasher,
    start: u64,
    bytes_written: u64,
}

/// Metadata for a file to be written
#[derive(Copy, Clone, Debug)]
pub struct FileOptions<'k> {
    compression_method: CompressionMethod,
    compression_level: Option<u32>,
    last_modified_time: DateTime,
    permissions: Option<u32>,
    large_file: bool,
    encryption: Option<(EncryptionMethod, &'k [u8])>,
    comment: &'k str,
}

impl<'k> FileOptions<'k> {
    /// Set the compression method for the new file
    ///
    /// The default is `CompressionMethod::Deflated`.
    pub fn compression_method(mut self, method: CompressionMethod) -> FileOptions<'k> {
        self.compression_method = method;
        self
    }

    /// Set the deflate level, `0..=9`. `None` picks the codec default.
    pub fn compression_level(mut self, level: Option<u32>) -> FileOptions<'k> {
        self.compression_level = level;
        self
    }

    /// Set the last modified time
    ///
    /// The default is 1980-01-01 00:00:00
    pub fn last_modified_time(mut self, mod_time: DateTime) -> FileOptions<'k> {
        self.last_modified_time = mod_time;
        self
    }

    /// Set the permissions for the new file.
    ///
    /// The format is represented with unix-style permissions.
    /// The default is `0o644`, which represents `rw-r--r--` for files,
    /// and `0o755`, which represents `rwxr-xr-x` for directories
    pub fn unix_permissions(mut self, mode: u32) -> FileOptions<'k> {
        self.permissions = Some(mode & 0o777);
        self
    }

    /// Reserve a Zip64 record in the local header.
    ///
    /// Required for entries of 4 GiB or more; writing past that size without
    /// it fails with [`ZipError::InvalidOptions`].
    pub fn large_file(mut self, large: bool) -> FileOptions<'k> {
        self.large_file = large;
        self
    }

    /// Encrypt with the traditional PKWARE cipher.
    pub fn with_zipcrypto(mut self, password: &'k [u8]) -> FileOptions<'k> {
        self.encryption = Some((EncryptionMethod::ZipCrypto, password));
        self
    }

    /// Encrypt with AE-2.
    pub fn with_aes_encryption(mut self, mode: AesMode, password: &'k [u8]) -> FileOptions<'k> {
        self.encryption = Some((EncryptionMethod::aes(mode), password));
        self
    }

    /// Encrypt with PKWARE strong encryption.
    pub fn with_strong_encryption(mut self, mode: AesMode, password: &'k [u8]) -> FileOptions<'k> {
        self.encryption = Some((EncryptionMethod::Strong(mode), password));
        self
    }

    /// Set the comment stored in the central directory header.
    pub fn comment(mut self, comment: &'k str) -> FileOptions<'k> {
        self.comment = comment;
        self
    }

    fn validate(&self) -> ZipResult<()> {
        if let CompressionMethod::Unsupported(_) = self.compression_method {
            return Err(ZipError::UnsupportedArchive("Unsupported compression"));
        }
        if matches!(self.compression_level, Some(level) if level > 9) {
            return Err(ZipError::InvalidOptions("deflate level must be 0..=9"));
        }
        Ok(())
    }
}

impl Default for FileOptions<'_> {
    fn default() -> Self {
        FileOptions {
            compression_method: CompressionMethod::Deflated,
            compression_level: None,
            last_modified_time: DateTime::default(),
            permissions: None,
            large_file: false,
            encryption: None,
            comment: "",
        }
    }
}

impl<S: VolumeSink> Write for ZipWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writing_to_file {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        }
        let large_file = self.model.files().last().map_or(false, |file| file.large_file);
        if !large_file && self.stats.bytes_written + buf.len() as u64 >= spec::ZIP64_BYTES_THR {
            return Err(ZipError::InvalidOptions("Large file option has not been set").into());
        }
        match self.inner.ref_mut() {
            Some(w) => {
                let write_result = w.write(buf);
                if let Ok(count) = write_result {
                    self.stats.update(&buf[0..count]);
                }
                write_result
            }
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "ZipWriter was already closed",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.ref_mut() {
            Some(w) => w.flush(),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "ZipWriter was already closed",
            )),
        }
    }
}

impl ZipWriterStats {
    fn update(&mut self, buf: &[u8]) {
        self.hasher.update(buf);
        self.bytes_written += buf.len() as u64;
    }
}

impl<W: Write + Seek> ZipWriter<SingleVolume<W>> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`ZipWriter::start_file`] function should be called.
    pub fn new(inner: W) -> ZipWriter<SingleVolume<W>> {
        ZipWriter::from_sink(SingleVolume::new(inner), None)
    }
}

impl ZipWriter<SplitWriter> {
    /// Initializes a split archive whose volumes hold at most `split_size` bytes.
    ///
    /// The last volume is written to `path`, earlier ones next to it as
    /// `.z01`, `.z02`, ...
    pub fn new_split<P: AsRef<Path>>(path: P, split_size: u64) -> ZipResult<ZipWriter<SplitWriter>> {
        let sink = SplitWriter::create(path, split_size)?;
        Ok(ZipWriter::from_sink(sink, Some(split_size)))
    }
}

impl<S: VolumeSink> ZipWriter<S> {
    fn from_sink(sink: S, split_size: Option<u64>) -> ZipWriter<S> {
        ZipWriter {
            inner: GenericZipWriter::Storer(sink),
            model: ZipModel::new(split_size, Default::default()),
            stats: Default::default(),
            writing_to_file: false,
            central_directory_key: None,
        }
    }

    /// Set ZIP archive comment.
    pub fn set_comment<C>(&mut self, comment: C)
    where
        C: Into<String>,
    {
        self.model.set_comment(comment.into().into_bytes());
    }

    /// Store the central directory encrypted with `password`.
    ///
    /// Entry names and attributes can then only be listed with the password.
    pub fn encrypt_central_directory(&mut self, password: &[u8], mode: AesMode) {
        self.central_directory_key = Some((password.to_vec(), mode));
    }

    /// The entries written so far.
    pub fn model(&self) -> &ZipModel {
        &self.model
    }

    /// Start a new file for with the requested options.
    fn start_entry<N>(&mut self, name: N, options: FileOptions<'_>) -> ZipResult<()>
    where
        N: Into<String>,
    {
        self.finish_file()?;
        options.validate()?;

        let (encryption, password) = match options.encryption {
            Some((method, password)) => (method, Some(password)),
            None => (EncryptionMethod::None, None),
        };
        let sink = self.inner.get_plain()?;

        let mut file = ZipFileData::new(name.into());
        file.compression_method = options.compression_method;
        file.last_modified_time = options.last_modified_time;
        file.external_attributes = options.permissions.unwrap_or(ffi::S_IFREG | 0o644) << 16;
        file.large_file = options.large_file;
        file.encryption = encryption;
        file.file_comment = options.comment.to_string();
        file.file_comment_raw = options.comment.as_bytes().to_vec();

        let mut flags = 0;
        if !file.file_name.is_ascii() || !file.file_comment.is_ascii() {
            flags |= spec::FLAG_UTF8;
        }
        match encryption {
            EncryptionMethod::None => {}
            EncryptionMethod::ZipCrypto => flags |= spec::FLAG_ENCRYPTED | spec::FLAG_DATA_DESCRIPTOR,
            EncryptionMethod::Aes { mode, vendor } => {
                flags |= spec::FLAG_ENCRYPTED;
                file.extra_field.set(ExtraField::Aes(AesExtraField {
                    vendor_version: vendor,
                    mode,
                    compression_method: options.compression_method,
                }));
            }
            EncryptionMethod::Strong(mode) => {
                flags |= spec::FLAG_ENCRYPTED | spec::FLAG_STRONG_ENCRYPTION;
                file.extra_field
                    .set(ExtraField::StrongEncryption(StrongEncryptionField::for_mode(mode)));
            }
        }
        if !sink.supports_patching() {
            flags |= spec::FLAG_DATA_DESCRIPTOR;
        }
        file.flags = flags;

        let sentinel = if file.large_file { u32::MAX } else { 0 };
        let mut header = LocalFileHeader {
            version_needed: 0,
            flags: file.flags,
            compression_method: file.header_compression_method(),
            last_mod_time: file.last_modified_time.timepart(),
            last_mod_date: file.last_modified_time.datepart(),
            crc32: 0,
            compressed_size: sentinel,
            uncompressed_size: sentinel,
            file_name: file.file_name_raw.clone(),
            extra_field: file
                .extra_field
                .with_zip64(
                    file.large_file
                        .then(|| Zip64ExtendedInformation::local_header(0, 0)),
                )
                .encode()?,
        };
        // the offset decides the version, and may only be known after a roll-over
        sink.reserve(header.len())?;
        file.disk_number = sink.disk_number();
        file.header_start = sink.position();
        header.version_needed = file.version_needed();
        let (disk_number, header_start) = sink.write_guarded(&header.encode()?)?;

        self.stats.start = sink.bytes_written();
        self.stats.bytes_written = 0;
        self.stats.hasher = Hasher::new();
        tracing::trace!(
            name = %file.file_name,
            disk_number,
            header_start,
            encryption = ?file.encryption,
            "started entry"
        );

        let compression_method = file.compression_method;
        let compression_level = options.compression_level;
        self.model.push(file);
        let file = self.model.files().last().ok_or(ZipError::FileNotFound)?;
        self.inner.switch_to(file, password, compression_method, compression_level)?;
        Ok(())
    }

    fn finish_file(&mut self) -> ZipResult<()> {
        if !self.inner.finish_entry()? {
            return Ok(());
        }
        self.writing_to_file = false;

        let sink = self.inner.get_plain()?;
        let file = match self.model.last_mut() {
            Some(file) => file,
            None => return Ok(()),
        };
        file.crc32 = match file.encryption {
            EncryptionMethod::Aes {
                vendor: AesVendorVersion::Ae2,
                ..
            } => 0,
            _ => mem::take(&mut self.stats.hasher).finalize(),
        };
        file.uncompressed_size = self.stats.bytes_written;
        file.compressed_size = sink.bytes_written() - self.stats.start;

        if !file.large_file
            && (file.compressed_size >= spec::ZIP64_BYTES_THR
                || file.uncompressed_size >= spec::ZIP64_BYTES_THR)
        {
            return Err(ZipError::InvalidOptions("Large file option has not been set"));
        }

        if file.uses_data_descriptor() {
            let descriptor = DataDescriptor {
                crc32: file.crc32,
                compressed_size: file.compressed_size,
                uncompressed_size: file.uncompressed_size,
            };
            sink.write_guarded(&descriptor.encode(file.large_file)?)?;
        } else {
            update_local_file_header(sink, file)?;
        }
        tracing::trace!(
            name = %file.file_name,
            crc32 = file.crc32,
            compressed_size = file.compressed_size,
            uncompressed_size = file.uncompressed_size,
            "finished entry"
        );

        if file.needs_zip64() {
            self.model.note_zip64();
        }
        Ok(())
    }

    /// Starts a file.
    ///
    /// The data should be written using the [`io::Write`] implementation on this [`ZipWriter`]
    pub fn start_file<N>(&mut self, name: N, mut options: FileOptions<'_>) -> ZipResult<()>
    where
        N: Into<String>,
    {
        options.permissions = Some(options.permissions.unwrap_or(0o644) | ffi::S_IFREG);
        self.start_entry(name, options)?;
        self.writing_to_file = true;
        Ok(())
    }

    /// Add a directory entry.
    ///
    /// You can't write data to the file afterwards. Directories are never
    /// compressed or encrypted.
    pub fn add_directory<N>(&mut self, name: N, mut options: FileOptions<'_>) -> ZipResult<()>
    where
        N: Into<String>,
    {
        options.permissions = Some(options.permissions.unwrap_or(0o755) | ffi::S_IFDIR);
        options.compression_method = CompressionMethod::Stored;
        options.encryption = None;

        let name_as_string = name.into();
        // Append a slash to the filename if it does not end with it.
        let name_with_slash = match name_as_string.chars().last() {
            Some('/') | Some('\\') => name_as_string,
            _ => name_as_string + "/",
        };

        self.start_entry(name_with_slash, options)?;
        self.writing_to_file = false;
        Ok(())
    }

    /// Add an entry of another archive without decompressing or decrypting it.
    ///
    /// `file` should come from [`crate::ZipArchive::by_index_raw`] or
    /// [`crate::ZipArchive::by_name_raw`], or be an unencrypted entry that
    /// was not read yet.
    pub fn raw_copy_file(&mut self, file: ZipFile<'_>) -> ZipResult<()> {
        let name = file.name().to_string();
        self.raw_copy_file_rename(file, name)
    }

    /// Like [`ZipWriter::raw_copy_file`], storing the entry under `name`.
    pub fn raw_copy_file_rename<N>(&mut self, mut file: ZipFile<'_>, name: N) -> ZipResult<()>
    where
        N: Into<String>,
    {
        file.make_raw()?;
        self.finish_file()?;

        let name = name.into();
        let mut data = file.data().clone();
        let mut header = file.local_header().clone();
        if name != data.file_name {
            data.file_name_raw = name.clone().into_bytes();
            data.file_name = name;
            if !data.file_name.is_ascii() {
                data.flags |= spec::FLAG_UTF8;
                header.flags |= spec::FLAG_UTF8;
            }
            header.file_name = data.file_name_raw.clone();
        }
        data.large_file = file.has_zip64_local_header();

        let sink = self.inner.get_plain()?;
        let (disk_number, header_start) = sink.write_guarded(&header.encode()?)?;
        data.disk_number = disk_number;
        data.header_start = header_start;

        let copied = io::copy(&mut file, sink)?;
        if copied != data.compressed_size {
            return Err(ZipError::MalformedRecord("entry data ends before its compressed size"));
        }
        if data.uses_data_descriptor() {
            let descriptor = DataDescriptor {
                crc32: data.crc32,
                compressed_size: data.compressed_size,
                uncompressed_size: data.uncompressed_size,
            };
            sink.write_guarded(&descriptor.encode(data.large_file)?)?;
        }
        tracing::trace!(
            name = %data.file_name,
            disk_number,
            header_start,
            compressed_size = data.compressed_size,
            "copied raw entry"
        );

        self.model.push(data);
        Ok(())
    }

    /// Finish the last file and write all other zip-structures
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    /// Note that the zipfile will also be finished on drop.
    pub fn finish(&mut self) -> ZipResult<S::Inner> {
        self.finalize()?;
        match mem::replace(&mut self.inner, GenericZipWriter::Closed) {
            GenericZipWriter::Storer(sink) => sink.close(),
            _ => Err(io::Error::new(io::ErrorKind::BrokenPipe, "ZipWriter was already closed").into()),
        }
    }

    fn finalize(&mut self) -> ZipResult<()> {
        self.finish_file()?;
        let key = self
            .central_directory_key
            .as_ref()
            .map(|(password, mode)| (password.as_slice(), *mode));
        let sink = self.inner.get_plain()?;
        write_central_directory(sink, &mut self.model, key)
    }
}

impl<S: VolumeSink> Drop for ZipWriter<S> {
    fn drop(&mut self) {
        if self.inner.is_closed() {
            return;
        }
        let result = self.finalize().and_then(|_| {
            match mem::replace(&mut self.inner, GenericZipWriter::Closed) {
                GenericZipWriter::Storer(sink) => sink.close().map(|_| ()),
                _ => Ok(()),
            }
        });
        if let Err(e) = result {
            tracing::error!(error = %e, "ZipWriter drop failed");
        }
    }
}

impl<S: VolumeSink> GenericZipWriter<S> {
    fn switch_to(
        &mut self,
        file: &ZipFileData,
        password: Option<&[u8]>,
        compression: CompressionMethod,
        level: Option<u32>,
    ) -> ZipResult<()> {
        let sink = match mem::replace(self, GenericZipWriter::Closed) {
            GenericZipWriter::Storer(sink) => sink,
            other => {
                *self = other;
                return Err(ZipError::InvalidOptions("an entry is already open"));
            }
        };
        let crypto = CryptoWriter::new(sink, file, password)?;
        *self = GenericZipWriter::Entry(Compressor::new(compression, level, crypto)?);
        Ok(())
    }

    /// Closes the open entry's codec and cipher. False if no entry was open.
    fn finish_entry(&mut self) -> ZipResult<bool> {
        match mem::replace(self, GenericZipWriter::Closed) {
            GenericZipWriter::Entry(compressor) => {
                let sink = compressor.finish()?.finish()?;
                *self = GenericZipWriter::Storer(sink);
                Ok(true)
            }
            GenericZipWriter::Storer(sink) => {
                *self = GenericZipWriter::Storer(sink);
                Ok(false)
            }
            GenericZipWriter::Closed => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "ZipWriter was already closed").into())
            }
        }
    }

    fn ref_mut(&mut self) -> Option<&mut dyn Write> {
        match self {
            GenericZipWriter::Storer(w) => Some(w as &mut dyn Write),
            GenericZipWriter::Entry(w) => Some(w as &mut dyn Write),
            GenericZipWriter::Closed => None,
        }
    }

    fn is_closed(&self) -> bool {
        matches!(self, GenericZipWriter::Closed)
    }

    fn get_plain(&mut self) -> ZipResult<&mut S> {
        match self {
            GenericZipWriter::Storer(sink) => Ok(sink),
            GenericZipWriter::Entry(_) => Err(ZipError::InvalidOptions("an entry is still open")),
            GenericZipWriter::Closed => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "ZipWriter was already closed").into())
            }
        }
    }
}

/// Writes the final crc and sizes over the placeholders of the local header.
fn update_local_file_header<S: VolumeSink>(sink: &mut S, file: &ZipFileData) -> ZipResult<()> {
    let mut out = DataOutput::buffer();
    out.write_dword(file.crc32)?;
    if file.large_file {
        out.write_dword(u32::MAX)?;
        out.write_dword(u32::MAX)?;
    } else {
        out.write_dword(file.compressed_size as u32)?;
        out.write_dword(file.uncompressed_size as u32)?;
    }
    sink.patch(
        file.disk_number,
        file.header_start + LocalFileHeader::CRC32_OFFSET,
        out.get_ref(),
    )?;

    if file.large_file {
        // header id and length precede the two sizes
        let zip64_start =
            file.header_start + LocalFileHeader::FIXED_SIZE + file.file_name_raw.len() as u64 + 4;
        let mut out = DataOutput::buffer();
        out.write_qword(file.uncompressed_size)?;
        out.write_qword(file.compressed_size)?;
        sink.patch(file.disk_number, zip64_start, out.get_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::central_directory::encode_header;
    use crate::codec::DataInput;
    use crate::read::ZipArchive;
    use std::io::Cursor;

    fn archive(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn write_empty_zip() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.set_comment("ZIP");
        let result = writer.finish().unwrap();
        assert_eq!(result.get_ref().len(), 25);
        assert_eq!(
            *result.get_ref(),
            [80, 75, 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 90, 73, 80]
        );
    }

    #[test]
    fn write_zip_dir() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory(
                "test",
                FileOptions::default().last_modified_time(
                    DateTime::from_date_and_time(2018, 8, 15, 20, 45, 6).unwrap(),
                ),
            )
            .unwrap();
        assert!(writer
            .write(b"writing to a directory is not allowed, and will not write any data")
            .is_err());
        let result = writer.finish().unwrap();
        assert_eq!(result.get_ref().len(), 108);
        assert_eq!(
            *result.get_ref(),
            &[
                80u8, 75, 3, 4, 20, 0, 0, 0, 0, 0, 163, 165, 15, 77, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 5, 0, 0, 0, 116, 101, 115, 116, 47, 80, 75, 1, 2, 63, 3, 20, 0, 0, 0, 0, 0,
                163, 165, 15, 77, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 0, 237, 65, 0, 0, 0, 0, 116, 101, 115, 116, 47, 80, 75, 5, 6, 0, 0, 0, 0, 1,
                0, 1, 0, 51, 0, 0, 0, 35, 0, 0, 0, 0, 0,
            ] as &[u8]
        );
    }

    #[test]
    fn local_header_is_patched() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "a.txt",
                FileOptions::default().compression_method(CompressionMethod::Stored),
            )
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let header = LocalFileHeader::read(&mut DataInput::new(&bytes[..])).unwrap();
        assert_eq!(header.flags & spec::FLAG_DATA_DESCRIPTOR, 0);
        assert_eq!(header.crc32, crc32fast::hash(b"hello"));
        assert_eq!(header.compressed_size, 5);
        assert_eq!(header.uncompressed_size, 5);
        assert_eq!(&bytes[35..40], b"hello");
    }

    #[test]
    fn large_file_reserves_zip64_sizes() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("big", FileOptions::default().large_file(true))
            .unwrap();
        writer.write_all(&[7u8; 1000]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let header = LocalFileHeader::read(&mut DataInput::new(&bytes[..])).unwrap();
        assert_eq!(header.compressed_size, u32::MAX);
        assert_eq!(header.uncompressed_size, u32::MAX);
        assert_eq!(header.version_needed, 45);
        assert_eq!(&header.extra_field[..4], &[1, 0, 16, 0]);
        assert_eq!(&header.extra_field[4..12], &1000u64.to_le_bytes());

        let mut zip = archive(bytes);
        let mut file = zip.by_index(0).unwrap();
        assert!(file.has_zip64_local_header());
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, vec![7u8; 1000]);
    }

    #[test]
    fn large_file_option_is_enforced() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("big", FileOptions::default()).unwrap();
        writer.stats.bytes_written = spec::ZIP64_BYTES_THR - 1;
        let err = writer.write(b"x").unwrap_err();
        assert!(matches!(ZipError::from(err), ZipError::InvalidOptions(_)));
        writer.inner = GenericZipWriter::Closed;
    }

    #[test]
    fn zipcrypto_entries_use_a_data_descriptor() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("secret.txt", FileOptions::default().with_zipcrypto(b"pw"))
            .unwrap();
        writer.write_all(b"hidden words").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let header = LocalFileHeader::read(&mut DataInput::new(&bytes[..])).unwrap();
        assert_eq!(
            header.flags & (spec::FLAG_ENCRYPTED | spec::FLAG_DATA_DESCRIPTOR),
            spec::FLAG_ENCRYPTED | spec::FLAG_DATA_DESCRIPTOR
        );
        assert_eq!(header.crc32, 0);

        let mut zip = archive(bytes);
        assert!(matches!(zip.by_index(0), Err(ZipError::PasswordRequired)));
        let mut contents = String::new();
        zip.by_index_decrypt(0, b"pw")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hidden words");
    }

    #[test]
    fn aes_entries_announce_method_99() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "a.bin",
                FileOptions::default().with_aes_encryption(AesMode::Aes128, b"pw"),
            )
            .unwrap();
        writer.write_all(b"payload").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let header = LocalFileHeader::read(&mut DataInput::new(&bytes[..])).unwrap();
        assert_eq!(header.compression_method, CompressionMethod::AES_METHOD);
        assert_eq!(header.crc32, 0);

        let zip = archive(bytes);
        let data = &zip.model().files()[0];
        assert_eq!(data.compression_method, CompressionMethod::Deflated);
        // salt, verifier, payload, authentication code
        assert!(data.compressed_size >= 8 + 2 + 10);
    }

    #[test]
    fn non_ascii_names_set_the_utf8_flag() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("résumé.txt", FileOptions::default()).unwrap();
        writer.start_file("plain.txt", FileOptions::default()).unwrap();
        let zip = archive(writer.finish().unwrap().into_inner());
        assert!(zip.model().files()[0].is_utf8());
        assert!(!zip.model().files()[1].is_utf8());
        assert_eq!(zip.index_for_name("résumé.txt"), Some(0));
    }

    #[test]
    fn writer_finishes_on_drop() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buf);
            writer.start_file("a", FileOptions::default()).unwrap();
            writer.write_all(b"dropped").unwrap();
        }
        let mut zip = archive(buf.into_inner());
        let mut contents = String::new();
        zip.by_name("a").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "dropped");
    }

    #[test]
    fn invalid_level_keeps_the_writer_usable() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        assert!(writer
            .start_file("a", FileOptions::default().compression_level(Some(12)))
            .is_err());
        writer.start_file("b", FileOptions::default()).unwrap();
        let zip = archive(writer.finish().unwrap().into_inner());
        assert_eq!(zip.len(), 1);
    }

    /// Output that starts `base` bytes into its only volume.
    struct OffsetSink {
        bytes: Vec<u8>,
        base: u64,
    }

    impl Write for OffsetSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl VolumeSink for OffsetSink {
        type Inner = Vec<u8>;

        fn disk_number(&self) -> u32 {
            0
        }

        fn position(&self) -> u64 {
            self.base + self.bytes.len() as u64
        }

        fn bytes_written(&self) -> u64 {
            self.position()
        }

        fn reserve(&mut self, _len: u64) -> ZipResult<()> {
            Ok(())
        }

        fn supports_patching(&self) -> bool {
            false
        }

        fn patch(&mut self, _disk_number: u32, _offset: u64, _bytes: &[u8]) -> ZipResult<()> {
            Err(ZipError::InvalidOptions("not patchable"))
        }

        fn close(self) -> ZipResult<Vec<u8>> {
            Ok(self.bytes)
        }
    }

    #[test]
    fn local_header_version_accounts_for_a_zip64_offset() {
        let sink = OffsetSink {
            bytes: Vec::new(),
            base: spec::ZIP64_BYTES_THR,
        };
        let mut writer = ZipWriter::from_sink(sink, None);
        writer
            .start_file("far", FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        writer.write_all(b"far away").unwrap();
        let file = writer.model().files()[0].clone();
        let bytes = writer.finish().unwrap();

        assert_eq!(file.header_start, spec::ZIP64_BYTES_THR);
        assert_eq!(file.version_needed(), 45);
        let header = LocalFileHeader::read(&mut DataInput::new(&bytes[..])).unwrap();
        assert_eq!(header.version_needed, file.version_needed());
        let central = encode_header(&file).unwrap();
        assert_eq!(central.version_needed, header.version_needed);
    }
}
