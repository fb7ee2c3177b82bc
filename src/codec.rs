//! Little-endian primitive codec used by every record reader and writer.
//!
//! [`DataInput`] and [`DataOutput`] track the absolute stream position and keep
//! a small table of named marks, so a caller can later ask how many bytes were
//! consumed or produced since a mark was set. The table lives in the stream
//! object and is dropped with it.

use std::collections::HashMap;
use std::io;
use std::io::prelude::*;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::cp437::FromCp437;
use crate::result::{ZipError, ZipResult};

/// Character set used to decode names and comments that do not carry the
/// UTF-8 flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Charset {
    /// IBM code page 437, the historical default of the format
    #[default]
    Cp437,
    /// UTF-8
    Utf8,
}

impl Charset {
    /// Decodes raw bytes into a string using this character set.
    pub fn decode(self, raw: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            Charset::Cp437 => raw.to_vec().from_cp437(),
        }
    }
}

fn record_error(err: io::Error) -> ZipError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ZipError::MalformedRecord("record extends past the end of its region")
    } else {
        ZipError::from(err)
    }
}

/// Reading half of the codec.
#[derive(Debug)]
pub struct DataInput<R> {
    inner: R,
    pos: u64,
    marks: HashMap<&'static str, u64>,
}

impl<R: Read> DataInput<R> {
    /// Wraps a reader positioned at absolute offset 0.
    pub fn new(inner: R) -> DataInput<R> {
        DataInput::at(inner, 0)
    }

    /// Wraps a reader that is already positioned at `pos`.
    pub fn at(inner: R, pos: u64) -> DataInput<R> {
        DataInput {
            inner,
            pos,
            marks: HashMap::new(),
        }
    }

    /// Reads one byte.
    pub fn read_byte(&mut self) -> ZipResult<u8> {
        let value = self.inner.read_u8().map_err(record_error)?;
        self.pos += 1;
        Ok(value)
    }

    /// Reads a little endian u16.
    pub fn read_word(&mut self) -> ZipResult<u16> {
        let value = self.inner.read_u16::<LittleEndian>().map_err(record_error)?;
        self.pos += 2;
        Ok(value)
    }

    /// Reads a little endian u32.
    pub fn read_dword(&mut self) -> ZipResult<u32> {
        let value = self.inner.read_u32::<LittleEndian>().map_err(record_error)?;
        self.pos += 4;
        Ok(value)
    }

    /// Reads a little endian u64.
    pub fn read_qword(&mut self) -> ZipResult<u64> {
        let value = self.inner.read_u64::<LittleEndian>().map_err(record_error)?;
        self.pos += 8;
        Ok(value)
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> ZipResult<Vec<u8>> {
        let mut buf = Vec::new();
        // `take` keeps a hostile length field from forcing a huge allocation up front
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(record_error)?;
        self.pos += read as u64;
        if read != len {
            return Err(ZipError::MalformedRecord(
                "record extends past the end of its region",
            ));
        }
        Ok(buf)
    }

    /// Reads `len` bytes and decodes them with `charset`.
    pub fn read_string(&mut self, len: usize, charset: Charset) -> ZipResult<String> {
        let raw = self.read_bytes(len)?;
        Ok(charset.decode(&raw))
    }

    /// Consumes and discards `len` bytes.
    pub fn skip(&mut self, len: u64) -> ZipResult<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())
            .map_err(record_error)?;
        self.pos += skipped;
        if skipped != len {
            return Err(ZipError::MalformedRecord(
                "record extends past the end of its region",
            ));
        }
        Ok(())
    }
}

impl<R> DataInput<R> {
    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Records the current offset under `name`.
    pub fn mark(&mut self, name: &'static str) {
        self.marks.insert(name, self.pos);
    }

    /// Bytes consumed since `mark(name)`.
    pub fn bytes_since_mark(&self, name: &'static str) -> ZipResult<u64> {
        self.marks
            .get(name)
            .map(|start| self.pos - start)
            .ok_or(ZipError::InvalidOptions("unknown stream mark"))
    }

    /// Gets a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Seek> DataInput<R> {
    /// Moves to an absolute offset of the underlying stream.
    pub fn seek(&mut self, pos: u64) -> ZipResult<()> {
        self.pos = self.inner.seek(io::SeekFrom::Start(pos))?;
        Ok(())
    }
}

impl<'a> DataInput<&'a [u8]> {
    /// Number of bytes left in a bounded in-memory region.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}

/// Writing half of the codec.
#[derive(Debug)]
pub struct DataOutput<W> {
    inner: W,
    pos: u64,
    marks: HashMap<&'static str, u64>,
}

impl<W: Write> DataOutput<W> {
    /// Wraps `inner`, counting offsets from zero.
    pub fn new(inner: W) -> DataOutput<W> {
        DataOutput::at(inner, 0)
    }

    /// Wraps `inner`, whose next byte is at offset `pos`.
    pub fn at(inner: W, pos: u64) -> DataOutput<W> {
        DataOutput {
            inner,
            pos,
            marks: HashMap::new(),
        }
    }

    /// Writes one byte.
    pub fn write_byte(&mut self, value: u8) -> ZipResult<()> {
        self.inner.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Writes a little endian u16.
    pub fn write_word(&mut self, value: u16) -> ZipResult<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(())
    }

    /// Writes a little endian u32.
    pub fn write_dword(&mut self, value: u32) -> ZipResult<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    /// Writes a little endian u64.
    pub fn write_qword(&mut self, value: u64) -> ZipResult<()> {
        self.inner.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Writes `buf` as is.
    pub fn write_bytes(&mut self, buf: &[u8]) -> ZipResult<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

impl<W> DataOutput<W> {
    /// Offset of the next byte written.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Records the current offset under `name`.
    pub fn mark(&mut self, name: &'static str) {
        self.marks.insert(name, self.pos);
    }

    /// Bytes written since `mark(name)`.
    pub fn bytes_since_mark(&self, name: &'static str) -> ZipResult<u64> {
        self.marks
            .get(name)
            .map(|start| self.pos - start)
            .ok_or(ZipError::InvalidOptions("unknown stream mark"))
    }

    /// Gets a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl DataOutput<Vec<u8>> {
    /// An output collecting into a fresh buffer.
    pub fn buffer() -> DataOutput<Vec<u8>> {
        DataOutput::new(Vec::new())
    }
}
