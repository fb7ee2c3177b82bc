//! Helper module to compute a CRC32 checksum

use std::io;
use std::io::prelude::*;

use crc32fast::Hasher;

use crate::result::ZipError;

/// Reader that validates the CRC32 and the byte count when it reaches the EOF.
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    check: u32,
    verify_crc: bool,
    expected_size: u64,
    bytes_read: u64,
    verified: bool,
}

impl<R> Crc32Reader<R> {
    /// Get a new Crc32Reader which checks the inner reader against checksum and size.
    ///
    /// AE-2 entries store no checksum; pass `verify_crc = false` for them.
    pub fn new(inner: R, checksum: u32, expected_size: u64, verify_crc: bool) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            check: checksum,
            verify_crc,
            expected_size,
            bytes_read: 0,
            verified: false,
        }
    }

    fn verify(&mut self) -> Result<(), ZipError> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        if self.bytes_read != self.expected_size {
            return Err(ZipError::SizeMismatch {
                expected: self.expected_size,
                actual: self.bytes_read,
            });
        }
        let actual = self.hasher.clone().finalize();
        if self.verify_crc && actual != self.check {
            return Err(ZipError::ChecksumMismatch {
                expected: self.check,
                actual,
            });
        }
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        if count == 0 && !buf.is_empty() {
            self.verify()?;
            return Ok(0);
        }
        self.hasher.update(&buf[0..count]);
        self.bytes_read += count as u64;
        if self.bytes_read > self.expected_size {
            self.verified = true;
            return Err(ZipError::SizeMismatch {
                expected: self.expected_size,
                actual: self.bytes_read,
            }
            .into());
        }
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_empty_reader() {
        let data: &[u8] = b"";
        let mut buf = [0; 1];

        let mut reader = Crc32Reader::new(data, 0, 0, true);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);

        let mut reader = Crc32Reader::new(data, 1, 0, true);
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            ZipError::from(err),
            ZipError::ChecksumMismatch { expected: 1, actual: 0 }
        ));
    }

    #[test]
    fn test_byte_by_byte() {
        let data: &[u8] = b"1234";
        let mut buf = [0; 1];

        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 4, true);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        // Can keep reading 0 bytes after the end
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_zero_read() {
        let data: &[u8] = b"1234";
        let mut buf = [0; 5];

        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 4, true);
        assert_eq!(reader.read(&mut buf[..0]).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let data: &[u8] = b"1234";
        let mut out = Vec::new();
        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 5, true);
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            ZipError::from(err),
            ZipError::SizeMismatch { expected: 5, actual: 4 }
        ));

        let mut reader = Crc32Reader::new(data, 0x9be3e0a3, 3, true);
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(ZipError::from(err), ZipError::SizeMismatch { .. }));
    }

    #[test]
    fn crc_check_can_be_skipped() {
        let data: &[u8] = b"1234";
        let mut out = Vec::new();
        let mut reader = Crc32Reader::new(data, 0, 4, false);
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"1234");
    }
}
