//! Traditional PKWARE encryption.
//!
//! A 12 byte header precedes the payload. Its last byte is compared to a
//! check byte taken from the entry, which rejects most wrong passwords
//! before any payload is decrypted.

use std::io;
use std::io::prelude::*;

use crate::result::{ZipError, ZipResult};

/// Size of the encryption header in bytes.
pub const HEADER_SIZE: usize = 12;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

fn crc32_update(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xff) as usize]
}

/// The three 32-bit keys of the cipher.
#[derive(Clone, Debug)]
pub(crate) struct ZipCryptoKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl ZipCryptoKeys {
    pub fn derive(password: &[u8]) -> ZipCryptoKeys {
        let mut keys = ZipCryptoKeys {
            key0: 0x12345678,
            key1: 0x23456789,
            key2: 0x34567890,
        };
        for &byte in password {
            keys.update(byte);
        }
        keys
    }

    fn update(&mut self, byte: u8) {
        self.key0 = crc32_update(self.key0, byte);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xff)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.key2 = crc32_update(self.key2, (self.key1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }
}

/// Reader that decrypts after the header was checked.
pub(crate) struct ZipCryptoReader<R> {
    reader: R,
    keys: ZipCryptoKeys,
}

impl<R: Read> ZipCryptoReader<R> {
    /// Consumes the header of `reader` and checks it against `check_byte`.
    pub fn new(mut reader: R, password: &[u8], check_byte: u8) -> ZipResult<ZipCryptoReader<R>> {
        let mut keys = ZipCryptoKeys::derive(password);
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                ZipError::MalformedRecord("entry is too short for its encryption header")
            }
            _ => ZipError::from(err),
        })?;
        for byte in header.iter_mut() {
            *byte = keys.decrypt_byte(*byte);
        }
        if header[HEADER_SIZE - 1] != check_byte {
            return Err(ZipError::IncorrectPassword);
        }
        Ok(ZipCryptoReader { reader, keys })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for ZipCryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.reader.read(buf)?;
        for byte in buf[..count].iter_mut() {
            *byte = self.keys.decrypt_byte(*byte);
        }
        Ok(count)
    }
}

/// Writer that emits the header first and encrypts everything after it.
pub(crate) struct ZipCryptoWriter<W> {
    writer: W,
    keys: ZipCryptoKeys,
    buffer: Vec<u8>,
}

impl<W: Write> ZipCryptoWriter<W> {
    pub fn new(writer: W, password: &[u8], check_byte: u8) -> ZipResult<ZipCryptoWriter<W>> {
        let mut header = [0u8; HEADER_SIZE];
        super::fill_random(&mut header[..HEADER_SIZE - 1])?;
        header[HEADER_SIZE - 1] = check_byte;
        ZipCryptoWriter::with_header(writer, password, header)
    }

    pub(crate) fn with_header(
        mut writer: W,
        password: &[u8],
        mut header: [u8; HEADER_SIZE],
    ) -> ZipResult<ZipCryptoWriter<W>> {
        let mut keys = ZipCryptoKeys::derive(password);
        for byte in header.iter_mut() {
            *byte = keys.encrypt_byte(*byte);
        }
        writer.write_all(&header)?;
        Ok(ZipCryptoWriter {
            writer,
            keys,
            buffer: Vec::new(),
        })
    }

    pub fn finish(self) -> ZipResult<W> {
        Ok(self.writer)
    }
}

impl<W: Write> Write for ZipCryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.clear();
        self.buffer
            .extend(buf.iter().map(|&byte| self.keys.encrypt_byte(byte)));
        self.writer.write_all(&self.buffer)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
