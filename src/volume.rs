//! Addressing of archives that span several files.
//!
//! A split archive named `name.zip` is stored as `name.z01`, `name.z02`, ...
//! followed by `name.zip` itself, which always holds the last volume. Offsets
//! inside records are relative to the start of their volume; [`VolumeMap`]
//! converts them to one logical offset space and [`VolumeReader`] reads that
//! space as a single stream.

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::result::{ZipError, ZipResult};

/// Path of the numbered volume `disk_number` of the archive at `base`.
///
/// Only volumes before the last one carry a number; the last volume is `base`.
pub fn volume_path(base: &Path, disk_number: u32) -> PathBuf {
    base.with_extension(format!("z{:02}", disk_number as u64 + 1))
}

/// One physical file of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Zero based disk number
    pub disk_number: u32,
    /// File backing this volume
    pub path: PathBuf,
    /// Logical offset of the first byte of this volume
    pub offset: u64,
    /// Length of this volume in bytes
    pub length: u64,
}

/// The volumes of one archive, in disk order.
#[derive(Debug, Clone)]
pub struct VolumeMap {
    base: Option<PathBuf>,
    volumes: Vec<Volume>,
}

impl VolumeMap {
    /// A map for an archive held in one stream of `length` bytes.
    pub fn single(length: u64) -> VolumeMap {
        VolumeMap {
            base: None,
            volumes: vec![Volume {
                disk_number: 0,
                path: PathBuf::new(),
                offset: 0,
                length,
            }],
        }
    }

    /// Finds the volumes of the archive whose last volume is `path`.
    ///
    /// Numbered volumes are collected from `.z01` upwards until one is missing.
    pub fn discover<P: AsRef<Path>>(path: P) -> ZipResult<VolumeMap> {
        let base = path.as_ref().to_path_buf();
        if !base.is_file() {
            return Err(ZipError::VolumeNotFound(base));
        }
        let mut paths = Vec::new();
        loop {
            let numbered = volume_path(&base, paths.len() as u32);
            if !numbered.is_file() {
                break;
            }
            paths.push(numbered);
        }
        paths.push(base.clone());

        let mut volumes = Vec::with_capacity(paths.len());
        let mut offset = 0;
        for (disk_number, path) in paths.into_iter().enumerate() {
            let length = std::fs::metadata(&path)?.len();
            volumes.push(Volume {
                disk_number: disk_number as u32,
                path,
                offset,
                length,
            });
            offset += length;
        }
        tracing::debug!(volumes = volumes.len(), total_length = offset, "discovered archive volumes");
        Ok(VolumeMap {
            base: Some(base),
            volumes,
        })
    }

    /// The volumes in disk order.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Number of volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// True if the map has no volumes.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Sum of all volume lengths.
    pub fn total_length(&self) -> u64 {
        self.volumes
            .last()
            .map(|last| last.offset + last.length)
            .unwrap_or(0)
    }

    /// Checks that exactly `count` volumes make up the archive.
    pub fn expect_volumes(&self, count: u64) -> ZipResult<()> {
        let found = self.volumes.len() as u64;
        if count == found {
            return Ok(());
        }
        match &self.base {
            None => Err(ZipError::UnsupportedArchive(
                "split archives must be opened from their volume files",
            )),
            Some(base) if count > found => Err(ZipError::VolumeNotFound(volume_path(
                base,
                (found - 1) as u32,
            ))),
            Some(_) => Err(ZipError::MalformedRecord(
                "more volume files exist than the archive refers to",
            )),
        }
    }

    /// Drops numbered volumes beyond the `count` the archive's trailer names.
    ///
    /// The last volume is always the archive file itself, so leftover files
    /// from an older archive with the same name are ignored.
    pub fn retain_disks(&mut self, count: u64) {
        if self.base.is_none() || count == 0 || self.volumes.len() as u64 <= count {
            return;
        }
        let stale = self.volumes.len() as u64 - count;
        tracing::warn!(stale, "ignoring volume files the archive does not refer to");
        let last = self.volumes.pop();
        self.volumes.truncate(count as usize - 1);
        self.volumes.extend(last);
        let mut offset = 0;
        for (disk_number, volume) in self.volumes.iter_mut().enumerate() {
            volume.disk_number = disk_number as u32;
            volume.offset = offset;
            offset += volume.length;
        }
    }

    /// Logical offset of `relative_offset` on disk `disk_number`.
    pub fn absolute(&self, disk_number: u32, relative_offset: u64) -> ZipResult<u64> {
        let volume = self.volume(disk_number)?;
        Ok(volume.offset + relative_offset)
    }

    /// Disk number and relative offset of a logical offset.
    pub fn relative(&self, absolute: u64) -> Option<(u32, u64)> {
        self.locate(absolute)
            .map(|volume| (volume.disk_number, absolute - volume.offset))
    }

    /// The volume holding the logical offset `absolute`.
    pub fn locate(&self, absolute: u64) -> Option<&Volume> {
        let index = self
            .volumes
            .partition_point(|volume| volume.offset + volume.length <= absolute);
        self.volumes.get(index)
    }

    fn volume(&self, disk_number: u32) -> ZipResult<&Volume> {
        match self.volumes.get(disk_number as usize) {
            Some(volume) => Ok(volume),
            None => match &self.base {
                Some(base) => Err(ZipError::VolumeNotFound(volume_path(base, disk_number))),
                None => Err(ZipError::MalformedRecord(
                    "record refers to a disk the archive does not have",
                )),
            },
        }
    }
}

/// Reads the volumes of a [`VolumeMap`] as one seekable stream.
///
/// Volume files are opened on demand, one at a time.
#[derive(Debug)]
pub struct VolumeReader {
    map: VolumeMap,
    current: Option<(u32, File)>,
    pos: u64,
}

impl VolumeReader {
    /// Reads the volumes of `map`.
    pub fn new(map: VolumeMap) -> VolumeReader {
        VolumeReader {
            map,
            current: None,
            pos: 0,
        }
    }

    /// The volumes being read.
    pub fn map(&self) -> &VolumeMap {
        &self.map
    }

    fn file_at(&mut self, volume: &Volume) -> io::Result<&mut File> {
        let reopen = !matches!(&self.current, Some((disk, _)) if *disk == volume.disk_number);
        if reopen {
            let file = File::open(&volume.path).map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => ZipError::VolumeNotFound(volume.path.clone()).into(),
                _ => err,
            })?;
            self.current = Some((volume.disk_number, file));
        }
        match &mut self.current {
            Some((_, file)) => Ok(file),
            None => Err(io::Error::new(io::ErrorKind::Other, "no volume is open")),
        }
    }
}

impl Read for VolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let volume = match self.map.locate(self.pos) {
            Some(volume) => volume.clone(),
            None => return Ok(0),
        };
        let relative = self.pos - volume.offset;
        let len = buf.len().min((volume.length - relative) as usize);
        let file = self.file_at(&volume)?;
        file.seek(io::SeekFrom::Start(relative))?;
        let count = file.read(&mut buf[..len])?;
        self.pos += count as u64;
        Ok(count)
    }
}

impl Seek for VolumeReader {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => Some(offset),
            io::SeekFrom::End(delta) => self.map.total_length().checked_add_signed(delta),
            io::SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
