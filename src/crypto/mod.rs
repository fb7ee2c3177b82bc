//! Encryption stages of the entry pipelines.
//!
//! Each entry uses one of a closed set of engines, selected by pattern
//! matching on [`EncryptionMethod`]. Every reading engine checks the password
//! when it is built, before any payload byte is decrypted, and every writing
//! engine must be finished to emit its trailing bytes.

use std::io;
use std::io::prelude::*;

use ::aes::cipher::generic_array::GenericArray;
use ::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::result::{ZipError, ZipResult};
use crate::types::{EncryptionMethod, ZipFileData};

mod aes;
mod aes_ctr;
pub(crate) mod strong;
mod zipcrypto;

pub(crate) use self::aes::{AesReader, AesReaderValid, AesWriter};
pub(crate) use self::strong::{StrongReader, StrongWriter};
pub(crate) use self::zipcrypto::{ZipCryptoReader, ZipCryptoWriter};

/// Internal block size of an AES cipher.
pub(crate) const AES_BLOCK_SIZE: usize = 16;

/// An AES block cipher of any supported key size.
pub(crate) enum AesCipher {
    Aes128(::aes::Aes128),
    Aes192(::aes::Aes192),
    Aes256(::aes::Aes256),
}

impl AesCipher {
    pub fn new(key: &[u8]) -> ZipResult<AesCipher> {
        let invalid = |_| ZipError::InvalidOptions("invalid AES key length");
        Ok(match key.len() {
            16 => AesCipher::Aes128(::aes::Aes128::new_from_slice(key).map_err(invalid)?),
            24 => AesCipher::Aes192(::aes::Aes192::new_from_slice(key).map_err(invalid)?),
            32 => AesCipher::Aes256(::aes::Aes256::new_from_slice(key).map_err(invalid)?),
            _ => return Err(ZipError::InvalidOptions("invalid AES key length")),
        })
    }

    /// Encrypts one block in place. `block` must be [`AES_BLOCK_SIZE`] long.
    pub fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.encrypt_block(block),
            AesCipher::Aes192(cipher) => cipher.encrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    /// Decrypts one block in place. `block` must be [`AES_BLOCK_SIZE`] long.
    pub fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.decrypt_block(block),
            AesCipher::Aes192(cipher) => cipher.decrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.decrypt_block(block),
        }
    }
}

pub(crate) fn fill_random(buf: &mut [u8]) -> ZipResult<()> {
    getrandom::getrandom(buf).map_err(|err| ZipError::Io(io::Error::from(err)))
}

/// Check byte of the legacy header: the high byte of the DOS time when a
/// data descriptor follows, the high byte of the CRC-32 otherwise.
pub(crate) fn zipcrypto_check_byte(file: &ZipFileData) -> u8 {
    if file.uses_data_descriptor() {
        (file.last_modified_time.timepart() >> 8) as u8
    } else {
        (file.crc32 >> 24) as u8
    }
}

/// Decryption stage of the read pipeline.
pub(crate) enum CryptoReader<R> {
    Plain(R),
    ZipCrypto(ZipCryptoReader<R>),
    Aes(AesReaderValid<R>),
    Strong(StrongReader<R>),
}

impl<R: Read> CryptoReader<R> {
    /// Builds the stage for `file`, checking `password` on the way.
    pub fn new(reader: R, file: &ZipFileData, password: Option<&[u8]>) -> ZipResult<CryptoReader<R>> {
        let password = match (file.encryption, password) {
            (EncryptionMethod::None, _) => return Ok(CryptoReader::Plain(reader)),
            (_, None) => return Err(ZipError::PasswordRequired),
            (_, Some(password)) => password,
        };
        Ok(match file.encryption {
            EncryptionMethod::None => CryptoReader::Plain(reader),
            EncryptionMethod::ZipCrypto => CryptoReader::ZipCrypto(ZipCryptoReader::new(
                reader,
                password,
                zipcrypto_check_byte(file),
            )?),
            EncryptionMethod::Aes { mode, .. } => CryptoReader::Aes(
                AesReader::new(reader, mode, file.compressed_size)?.validate(password)?,
            ),
            EncryptionMethod::Strong(_) => CryptoReader::Strong(StrongReader::new(
                reader,
                password,
                file.crc32,
                file.uncompressed_size,
                file.compressed_size,
            )?),
        })
    }

    pub fn into_inner(self) -> R {
        match self {
            CryptoReader::Plain(r) => r,
            CryptoReader::ZipCrypto(r) => r.into_inner(),
            CryptoReader::Aes(r) => r.into_inner(),
            CryptoReader::Strong(r) => r.into_inner(),
        }
    }
}

impl<R: Read> Read for CryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CryptoReader::Plain(r) => r.read(buf),
            CryptoReader::ZipCrypto(r) => r.read(buf),
            CryptoReader::Aes(r) => r.read(buf),
            CryptoReader::Strong(r) => r.read(buf),
        }
    }
}

/// Encryption stage of the write pipeline.
pub(crate) enum CryptoWriter<W: Write> {
    Plain(W),
    ZipCrypto(ZipCryptoWriter<W>),
    Aes(AesWriter<W>),
    Strong(StrongWriter<W>),
}

impl<W: Write> CryptoWriter<W> {
    /// Builds the stage for `file` and writes its encryption header.
    pub fn new(writer: W, file: &ZipFileData, password: Option<&[u8]>) -> ZipResult<CryptoWriter<W>> {
        let password = match (file.encryption, password) {
            (EncryptionMethod::None, _) => return Ok(CryptoWriter::Plain(writer)),
            (_, None) => return Err(ZipError::PasswordRequired),
            (_, Some(password)) => password,
        };
        Ok(match file.encryption {
            EncryptionMethod::None => CryptoWriter::Plain(writer),
            EncryptionMethod::ZipCrypto => CryptoWriter::ZipCrypto(ZipCryptoWriter::new(
                writer,
                password,
                zipcrypto_check_byte(file),
            )?),
            EncryptionMethod::Aes { mode, .. } => {
                CryptoWriter::Aes(AesWriter::new(writer, password, mode)?)
            }
            EncryptionMethod::Strong(mode) => {
                CryptoWriter::Strong(StrongWriter::new(writer, password, mode)?)
            }
        })
    }

    /// Writes any trailing bytes and hands back the next stage.
    pub fn finish(self) -> ZipResult<W> {
        match self {
            CryptoWriter::Plain(w) => Ok(w),
            CryptoWriter::ZipCrypto(w) => w.finish(),
            CryptoWriter::Aes(w) => w.finish(),
            CryptoWriter::Strong(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for CryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CryptoWriter::Plain(w) => w.write(buf),
            CryptoWriter::ZipCrypto(w) => w.write(buf),
            CryptoWriter::Aes(w) => w.write(buf),
            CryptoWriter::Strong(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CryptoWriter::Plain(w) => w.flush(),
            CryptoWriter::ZipCrypto(w) => w.flush(),
            CryptoWriter::Aes(w) => w.flush(),
            CryptoWriter::Strong(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{AesMode, DateTime};

    fn entry(encryption: EncryptionMethod) -> ZipFileData {
        let mut file = ZipFileData::new("secret.txt".to_string());
        file.encryption = encryption;
        file.flags = crate::spec::FLAG_ENCRYPTED | crate::spec::FLAG_DATA_DESCRIPTOR;
        file.last_modified_time = DateTime::from_date_and_time(2020, 2, 29, 13, 37, 0).unwrap();
        file
    }

    #[test]
    fn every_engine_round_trips() {
        let plain = b"contents of an encrypted entry, long enough to span blocks".to_vec();
        for encryption in [
            EncryptionMethod::None,
            EncryptionMethod::ZipCrypto,
            EncryptionMethod::aes(AesMode::Aes192),
            EncryptionMethod::Strong(AesMode::Aes128),
        ] {
            let mut file = entry(encryption);
            let mut writer = CryptoWriter::new(Vec::new(), &file, Some(b"pw")).unwrap();
            writer.write_all(&plain).unwrap();
            let data = writer.finish().unwrap();
            file.compressed_size = data.len() as u64;
            file.uncompressed_size = plain.len() as u64;

            let mut reader = CryptoReader::new(&data[..], &file, Some(b"pw")).unwrap();
            let mut back = Vec::new();
            reader.read_to_end(&mut back).unwrap();
            assert_eq!(back, plain, "{:?}", encryption);
        }
    }

    #[test]
    fn missing_password_is_reported() {
        let file = entry(EncryptionMethod::ZipCrypto);
        assert!(matches!(
            CryptoReader::new(&b""[..], &file, None),
            Err(ZipError::PasswordRequired)
        ));
        assert!(matches!(
            CryptoWriter::new(Vec::new(), &file, None),
            Err(ZipError::PasswordRequired)
        ));
    }

    #[test]
    fn aes_cipher_rejects_odd_keys() {
        assert!(AesCipher::new(&[0u8; 20]).is_err());
        assert!(AesCipher::new(&[0u8; 24]).is_ok());
    }
}
