//! The in-memory picture of one archive.

use std::collections::HashMap;

use crate::central_directory::CentralDirectory;
use crate::codec::Charset;
use crate::spec::{self, CentralDirectoryEncryption};
use crate::types::ZipFileData;

/// Entries, trailer values and archive-wide settings of one archive.
///
/// A reader session fills it from the central directory; a writer session
/// grows it entry by entry and encodes the central directory from it.
/// Entries are kept in the order of their local headers.
#[derive(Debug, Clone, Default)]
pub struct ZipModel {
    files: Vec<ZipFileData>,
    names_map: HashMap<String, usize>,
    comment: Vec<u8>,
    split_size: Option<u64>,
    charset: Charset,
    zip64: bool,
    pub(crate) central_directory: CentralDirectory,
    pub(crate) encryption: Option<CentralDirectoryEncryption>,
}

impl ZipModel {
    /// An empty model.
    pub fn new(split_size: Option<u64>, charset: Charset) -> ZipModel {
        ZipModel {
            split_size,
            charset,
            ..ZipModel::default()
        }
    }

    /// Appends an entry. A later entry with the same name wins lookups.
    pub fn push(&mut self, file: ZipFileData) {
        if file.needs_zip64() {
            self.note_zip64();
        }
        self.names_map.insert(file.file_name.clone(), self.files.len());
        self.files.push(file);
    }

    /// Entries in local header order.
    pub fn files(&self) -> &[ZipFileData] {
        &self.files
    }

    /// The entry at `index`.
    pub fn file(&self, index: usize) -> Option<&ZipFileData> {
        self.files.get(index)
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut ZipFileData> {
        self.files.last_mut()
    }

    /// Index of the entry named `name`.
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names_map.get(name).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Archive comment, raw bytes.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Replaces the archive comment.
    pub fn set_comment(&mut self, comment: Vec<u8>) {
        self.comment = comment;
    }

    /// Volume capacity of a split archive, `None` for a single volume.
    pub fn split_size(&self) -> Option<u64> {
        self.split_size
    }

    /// Charset for names without the UTF-8 flag.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Trailer values as last read or written.
    pub fn central_directory(&self) -> &CentralDirectory {
        &self.central_directory
    }

    /// True if the central directory is stored encrypted.
    pub fn is_central_directory_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Records that some value of the archive moved to a Zip64 record.
    pub fn note_zip64(&mut self) {
        if !self.zip64 {
            tracing::debug!(entries = self.files.len(), "archive promoted to zip64");
            self.zip64 = true;
        }
    }

    /// True once any value of the archive needed a Zip64 record.
    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    /// True if the trailer needs the Zip64 end record and its locator.
    pub fn requires_zip64_trailer(&self) -> bool {
        let directory = &self.central_directory;
        self.zip64
            || self.encryption.is_some()
            || directory.number_of_files >= spec::ZIP64_ENTRY_THR
            || directory.number_of_files_on_this_disk >= spec::ZIP64_ENTRY_THR
            || directory.size >= spec::ZIP64_BYTES_THR
            || directory.offset >= spec::ZIP64_BYTES_THR
            || directory.disk_number >= spec::ZIP64_DISK_THR
            || directory.disk_with_central_directory >= spec::ZIP64_DISK_THR
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let mut model = ZipModel::new(None, Charset::Cp437);
        model.push(ZipFileData::new("a.txt".to_string()));
        model.push(ZipFileData::new("b/".to_string()));
        assert_eq!(model.len(), 2);
        assert_eq!(model.index_for_name("b/"), Some(1));
        assert_eq!(model.index_for_name("c"), None);
        assert!(model.file(1).unwrap().is_dir());
        assert!(!model.is_zip64());
    }

    #[test]
    fn large_entry_raises_the_zip64_flag() {
        let mut model = ZipModel::new(Some(65536), Charset::Utf8);
        let mut big = ZipFileData::new("big".to_string());
        big.uncompressed_size = 0xFFFF_FFFE;
        model.push(big.clone());
        assert!(!model.requires_zip64_trailer());

        big.uncompressed_size = 0xFFFF_FFFF;
        model.push(big);
        assert!(model.is_zip64());
        assert!(model.requires_zip64_trailer());
    }

    #[test]
    fn many_entries_need_the_zip64_trailer() {
        let mut model = ZipModel::default();
        model.central_directory.number_of_files = 0xFFFE;
        assert!(!model.requires_zip64_trailer());
        model.central_directory.number_of_files = 0xFFFF;
        assert!(model.requires_zip64_trailer());
    }
}
