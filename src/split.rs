//! Output sinks for the archive writer.
//!
//! [`SingleVolume`] writes one seekable stream. [`SplitWriter`] spreads the
//! archive over numbered volume files of a fixed capacity: entry payload may
//! cross a volume boundary, but records written through
//! [`VolumeSink::write_guarded`] never do.

use std::fs::{self, File};
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::result::{ZipError, ZipResult};
use crate::spec;
use crate::volume::volume_path;

/// Destination of an archive writer.
pub trait VolumeSink: Write {
    /// What [`VolumeSink::close`] hands back.
    type Inner;

    /// Zero based number of the volume being written.
    fn disk_number(&self) -> u32;

    /// Offset of the next byte relative to the start of the current volume.
    fn position(&self) -> u64;

    /// Bytes written over all volumes.
    fn bytes_written(&self) -> u64;

    /// Starts a new volume first if `len` bytes do not fit in the current one.
    fn reserve(&mut self, len: u64) -> ZipResult<()>;

    /// Writes a record that must not cross a volume boundary and returns the
    /// disk number and offset it starts at.
    fn write_guarded(&mut self, record: &[u8]) -> ZipResult<(u32, u64)> {
        self.reserve(record.len() as u64)?;
        let start = (self.disk_number(), self.position());
        self.write_all(record)?;
        Ok(start)
    }

    /// True if bytes already written can be overwritten with [`VolumeSink::patch`].
    fn supports_patching(&self) -> bool;

    /// Overwrites bytes at `offset` of volume `disk_number`.
    fn patch(&mut self, disk_number: u32, offset: u64, bytes: &[u8]) -> ZipResult<()>;

    /// Flushes the last volume and releases the output.
    fn close(self) -> ZipResult<Self::Inner>
    where
        Self: Sized;
}

/// A whole archive in one seekable stream.
///
/// Offsets are counted from the position of the stream when it was wrapped.
#[derive(Debug)]
pub struct SingleVolume<W: Write + Seek> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> SingleVolume<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> SingleVolume<W> {
        SingleVolume { inner, position: 0 }
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write + Seek> Write for SingleVolume<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;
        self.position += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> VolumeSink for SingleVolume<W> {
    type Inner = W;

    fn disk_number(&self) -> u32 {
        0
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn bytes_written(&self) -> u64 {
        self.position
    }

    fn reserve(&mut self, _len: u64) -> ZipResult<()> {
        Ok(())
    }

    fn supports_patching(&self) -> bool {
        true
    }

    fn patch(&mut self, disk_number: u32, offset: u64, bytes: &[u8]) -> ZipResult<()> {
        if disk_number != 0 || offset + bytes.len() as u64 > self.position {
            return Err(ZipError::InvalidOptions("patch outside of the written data"));
        }
        let end = self.inner.stream_position()?;
        let start = end - self.position;
        self.inner.seek(io::SeekFrom::Start(start + offset))?;
        self.inner.write_all(bytes)?;
        self.inner.seek(io::SeekFrom::Start(end))?;
        Ok(())
    }

    fn close(mut self) -> ZipResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Writes an archive as numbered volumes of at most `split_size` bytes.
///
/// The volume being written is always `path`; when it is full it is renamed
/// to its numbered name and a fresh `path` is started. A session that never
/// fills its first volume leaves a single file whose split marker is replaced
/// by the single volume marker.
#[derive(Debug)]
pub struct SplitWriter {
    path: PathBuf,
    split_size: u64,
    file: Option<io::BufWriter<File>>,
    disk_number: u32,
    position: u64,
    bytes_written: u64,
}

impl SplitWriter {
    /// Smallest accepted volume capacity.
    pub const MIN_SPLIT_SIZE: u64 = 64 * 1024;

    /// Creates the first volume at `path` and writes the split marker.
    pub fn create<P: AsRef<Path>>(path: P, split_size: u64) -> ZipResult<SplitWriter> {
        if split_size < Self::MIN_SPLIT_SIZE {
            return Err(ZipError::InvalidOptions("split size must be at least 64 KiB"));
        }
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = SplitWriter {
            path,
            split_size,
            file: Some(io::BufWriter::new(file)),
            disk_number: 0,
            position: 0,
            bytes_written: 0,
        };
        writer.write_all(&spec::SPLIT_ARCHIVE_SIGNATURE.to_le_bytes())?;
        Ok(writer)
    }

    /// Capacity of each volume.
    pub fn split_size(&self) -> u64 {
        self.split_size
    }

    /// Path of the last volume.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> io::Result<&mut io::BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "split writer is closed"))
    }

    fn roll_over(&mut self) -> ZipResult<()> {
        let target = volume_path(&self.path, self.disk_number);
        if target.exists() {
            return Err(ZipError::VolumeCreationError {
                path: target,
                reason: "a file with the volume name already exists",
            });
        }
        let file = self.file.take().ok_or(ZipError::InvalidOptions("split writer is closed"))?;
        file.into_inner().map_err(|err| err.into_error())?;
        fs::rename(&self.path, &target)?;
        self.file = Some(io::BufWriter::new(File::create(&self.path)?));
        self.disk_number += 1;
        self.position = 0;
        tracing::debug!(
            disk_number = self.disk_number,
            closed_volume = %target.display(),
            "started a new volume"
        );
        Ok(())
    }
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.position >= self.split_size {
            self.roll_over()?;
        }
        let room = (self.split_size - self.position).min(buf.len() as u64) as usize;
        let count = self.file_mut()?.write(&buf[..room])?;
        self.position += count as u64;
        self.bytes_written += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl VolumeSink for SplitWriter {
    type Inner = ();

    fn disk_number(&self) -> u32 {
        self.disk_number
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn reserve(&mut self, len: u64) -> ZipResult<()> {
        if len > self.split_size {
            return Err(ZipError::InvalidOptions("record is larger than the split size"));
        }
        if self.position + len > self.split_size || self.position >= self.split_size {
            self.roll_over()?;
        }
        Ok(())
    }

    fn supports_patching(&self) -> bool {
        false
    }

    fn patch(&mut self, _disk_number: u32, _offset: u64, _bytes: &[u8]) -> ZipResult<()> {
        Err(ZipError::InvalidOptions("split output cannot be patched"))
    }

    fn close(mut self) -> ZipResult<()> {
        let mut file = self
            .file
            .take()
            .ok_or(ZipError::InvalidOptions("split writer is closed"))?;
        if self.disk_number == 0 {
            file.seek(io::SeekFrom::Start(0))?;
            file.write_all(&spec::SINGLE_VOLUME_SPLIT_SIGNATURE.to_le_bytes())?;
        }
        file.flush()?;
        tracing::debug!(volumes = self.disk_number + 1, "closed split archive");
        Ok(())
    }
}
