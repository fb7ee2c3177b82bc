//! Possible ZIP compression methods.

use std::fmt;
use std::io;
use std::io::prelude::*;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::result::{ZipError, ZipResult};

/// Identifies the storage format used to compress a file within a ZIP archive.
///
/// Each file's compression method is stored alongside it, allowing the
/// contents to be read without context.
///
/// When creating ZIP files, you may choose the method to use with
/// [`crate::write::FileOptions::compression_method`]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum CompressionMethod {
    /// Store the file as is
    Stored,
    /// Compress the file using Deflate
    Deflated,
    /// A method this library cannot decode. Such entries can still be copied raw.
    Unsupported(u16),
}

impl CompressionMethod {
    /// Method code announced by AES encrypted entries. The real method lives in the AES extra record.
    pub const AES_METHOD: u16 = 99;

    /// Converts an u16 to its corresponding CompressionMethod
    pub fn from_u16(val: u16) -> CompressionMethod {
        match val {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            v => CompressionMethod::Unsupported(v),
        }
    }

    /// Converts a CompressionMethod to a u16
    pub fn to_u16(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Deflated
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Just duplicate what the Debug format looks like, i.e, the enum key:
        write!(f, "{:?}", self)
    }
}

/// Compression stage of the write pipeline.
pub(crate) enum Compressor<W: Write> {
    Stored(W),
    Deflated(DeflateEncoder<W>),
}

impl<W: Write> Compressor<W> {
    pub fn new(method: CompressionMethod, level: Option<u32>, inner: W) -> ZipResult<Compressor<W>> {
        match method {
            CompressionMethod::Stored => Ok(Compressor::Stored(inner)),
            CompressionMethod::Deflated => {
                let level = match level {
                    Some(level) if level <= 9 => flate2::Compression::new(level),
                    Some(_) => return Err(ZipError::InvalidOptions("deflate level must be 0..=9")),
                    None => flate2::Compression::default(),
                };
                Ok(Compressor::Deflated(DeflateEncoder::new(inner, level)))
            }
            CompressionMethod::Unsupported(..) => {
                Err(ZipError::UnsupportedArchive("Unsupported compression"))
            }
        }
    }

    /// Flushes the codec and hands back the next stage.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Compressor::Stored(w) => Ok(w),
            Compressor::Deflated(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Compressor::Stored(w) => w.write(buf),
            Compressor::Deflated(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Compressor::Stored(w) => w.flush(),
            Compressor::Deflated(w) => w.flush(),
        }
    }
}

/// Decompression stage of the read pipeline.
pub(crate) enum Decompressor<R: Read> {
    Stored(R),
    Deflated(DeflateDecoder<R>),
}

impl<R: Read> Decompressor<R> {
    pub fn new(method: CompressionMethod, inner: R) -> ZipResult<Decompressor<R>> {
        match method {
            CompressionMethod::Stored => Ok(Decompressor::Stored(inner)),
            CompressionMethod::Deflated => Ok(Decompressor::Deflated(DeflateDecoder::new(inner))),
            CompressionMethod::Unsupported(..) => {
                Err(ZipError::UnsupportedArchive("Compression method not supported"))
            }
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        match self {
            Decompressor::Stored(r) => r,
            Decompressor::Deflated(r) => r.get_mut(),
        }
    }
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Stored(r) => r.read(buf),
            Decompressor::Deflated(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_eq_to() {
        for v in 0..(u16::MAX as u32 + 1) {
            let from = CompressionMethod::from_u16(v as u16);
            let to = from.to_u16() as u32;
            assert_eq!(v, to);
        }
    }

    #[test]
    fn to_display_fmt() {
        for method in [CompressionMethod::Stored, CompressionMethod::Deflated] {
            let debug_str = format!("{:?}", method);
            let display_str = format!("{}", method);
            assert_eq!(debug_str, display_str);
        }
    }

    #[test]
    fn compressor_pipeline_round_trip() {
        let text = b"the quick brown fox jumps over the lazy dog, the quick brown fox";
        for method in [CompressionMethod::Stored, CompressionMethod::Deflated] {
            let mut compressor = Compressor::new(method, None, Vec::new()).unwrap();
            compressor.write_all(text).unwrap();
            let packed = compressor.finish().unwrap();

            let mut decompressor = Decompressor::new(method, &packed[..]).unwrap();
            let mut unpacked = Vec::new();
            decompressor.read_to_end(&mut unpacked).unwrap();
            assert_eq!(&unpacked[..], &text[..]);
        }
    }

    #[test]
    fn rejects_bad_level() {
        assert!(Compressor::new(CompressionMethod::Deflated, Some(12), Vec::new()).is_err());
        assert!(Decompressor::new(CompressionMethod::Unsupported(14), &b""[..]).is_err());
    }
}
