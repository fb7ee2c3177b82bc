//! AE-x encryption: PBKDF2 derived keys, the zip counter mode and a
//! truncated HMAC-SHA1 over the ciphertext.

use std::io;
use std::io::prelude::*;

use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::aes_ctr::AesCtrZipKeyStream;
use super::AesCipher;
use crate::result::{ZipError, ZipResult};
use crate::types::AesMode;

/// The length of the password verifcation value in bytes
const PWD_VERIFY_LENGTH: usize = 2;
/// The length of the authentication code in bytes
const AUTH_CODE_LENGTH: usize = 10;
/// The number of iterations used with PBKDF2
const ITERATION_COUNT: u32 = 1000;

type HmacSha1 = Hmac<Sha1>;

/// Bytes an AE-x entry adds around its ciphertext.
pub(crate) fn overhead(mode: AesMode) -> u64 {
    (mode.salt_length() + PWD_VERIFY_LENGTH + AUTH_CODE_LENGTH) as u64
}

struct DerivedKeys {
    cipher: AesCipher,
    mac: HmacSha1,
    verifier: [u8; PWD_VERIFY_LENGTH],
}

fn derive_keys(password: &[u8], salt: &[u8], mode: AesMode) -> ZipResult<DerivedKeys> {
    // the derived key holds the cipher key, the mac key and the verifier
    let key_length = mode.key_length();
    let mut derived_key = vec![0u8; 2 * key_length + PWD_VERIFY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, ITERATION_COUNT, &mut derived_key);

    let cipher = AesCipher::new(&derived_key[..key_length])?;
    let mac = HmacSha1::new_from_slice(&derived_key[key_length..2 * key_length])
        .map_err(|_| ZipError::InvalidOptions("invalid authentication key length"))?;
    let verifier = [derived_key[2 * key_length], derived_key[2 * key_length + 1]];
    Ok(DerivedKeys {
        cipher,
        mac,
        verifier,
    })
}

// an aes encrypted file starts with a salt, whose length depends on the used aes mode
// followed by a 2 byte password verification value
// then the variable length encrypted data
// and lastly a 10 byte authentication code
pub(crate) struct AesReader<R> {
    reader: R,
    aes_mode: AesMode,
    data_length: u64,
}

impl<R: Read> AesReader<R> {
    pub fn new(reader: R, aes_mode: AesMode, compressed_size: u64) -> ZipResult<AesReader<R>> {
        let data_length = compressed_size
            .checked_sub(overhead(aes_mode))
            .ok_or(ZipError::MalformedRecord(
                "AES entry is smaller than its salt and authentication code",
            ))?;
        Ok(AesReader {
            reader,
            aes_mode,
            data_length,
        })
    }

    /// Reads the salt and verifier and checks the password against them.
    pub fn validate(mut self, password: &[u8]) -> ZipResult<AesReaderValid<R>> {
        let mut salt = vec![0; self.aes_mode.salt_length()];
        let mut pwd_verification_value = [0; PWD_VERIFY_LENGTH];
        self.reader
            .read_exact(&mut salt)
            .and_then(|_| self.reader.read_exact(&mut pwd_verification_value))
            .map_err(|_| ZipError::MalformedRecord("AES header is truncated"))?;

        let keys = derive_keys(password, &salt, self.aes_mode)?;
        if pwd_verification_value != keys.verifier {
            return Err(ZipError::IncorrectPassword);
        }

        Ok(AesReaderValid {
            reader: self.reader.take(self.data_length),
            key_stream: AesCtrZipKeyStream::new(keys.cipher),
            mac: keys.mac,
            verified: false,
        })
    }
}

/// Decrypting reader; checks the authentication code when the ciphertext is exhausted.
pub(crate) struct AesReaderValid<R> {
    reader: io::Take<R>,
    key_stream: AesCtrZipKeyStream,
    mac: HmacSha1,
    verified: bool,
}

impl<R: Read> AesReaderValid<R> {
    fn verify(&mut self) -> ZipResult<()> {
        if self.verified {
            return Ok(());
        }
        if self.reader.limit() != 0 {
            return Err(ZipError::MalformedRecord("AES ciphertext is truncated"));
        }
        let mut auth_code = [0u8; AUTH_CODE_LENGTH];
        self.reader
            .get_mut()
            .read_exact(&mut auth_code)
            .map_err(|_| ZipError::MalformedRecord("AES authentication code is truncated"))?;
        self.verified = true;
        self.mac
            .clone()
            .verify_truncated_left(&auth_code)
            .map_err(|_| ZipError::AuthenticationFailed)
    }

    /// Consumes this decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read> Read for AesReaderValid<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.reader.read(buf)?;
        if count == 0 && !buf.is_empty() {
            self.verify()?;
            return Ok(0);
        }
        self.mac.update(&buf[..count]);
        self.key_stream.crypt(&mut buf[..count]);
        Ok(count)
    }
}

/// Encrypting writer; [`AesWriter::finish`] appends the authentication code.
pub(crate) struct AesWriter<W> {
    writer: W,
    key_stream: AesCtrZipKeyStream,
    mac: HmacSha1,
    buffer: Vec<u8>,
}

impl<W: Write> AesWriter<W> {
    pub fn new(writer: W, password: &[u8], aes_mode: AesMode) -> ZipResult<AesWriter<W>> {
        let mut salt = vec![0u8; aes_mode.salt_length()];
        super::fill_random(&mut salt)?;
        AesWriter::with_salt(writer, password, aes_mode, &salt)
    }

    pub(crate) fn with_salt(
        mut writer: W,
        password: &[u8],
        aes_mode: AesMode,
        salt: &[u8],
    ) -> ZipResult<AesWriter<W>> {
        let keys = derive_keys(password, salt, aes_mode)?;
        writer.write_all(salt)?;
        writer.write_all(&keys.verifier)?;
        Ok(AesWriter {
            writer,
            key_stream: AesCtrZipKeyStream::new(keys.cipher),
            mac: keys.mac,
            buffer: Vec::new(),
        })
    }

    pub fn finish(mut self) -> ZipResult<W> {
        let code = self.mac.finalize().into_bytes();
        self.writer.write_all(&code[..AUTH_CODE_LENGTH])?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for AesWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.key_stream.crypt(&mut self.buffer);
        self.mac.update(&self.buffer);
        self.writer.write_all(&self.buffer)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PLAINTEXT: &[u8] = b"Hello, AES world! This is more than one block.";

    fn known_entry() -> Vec<u8> {
        let hex = "0001020304050607b51caf4be4cfc3793868ccb61d8992e0035880eed463012cec35bf7687f76c\
                   10ef4e35bf17fd455d2539975b2171bd12aaa0e4fcff4ac83792b2";
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn writer_matches_known_entry() {
        let salt: Vec<u8> = (0..8).collect();
        let mut writer =
            AesWriter::with_salt(Vec::new(), b"password", AesMode::Aes128, &salt).unwrap();
        writer.write_all(&PLAINTEXT[..20]).unwrap();
        writer.write_all(&PLAINTEXT[20..]).unwrap();
        assert_eq!(writer.finish().unwrap(), known_entry());
    }

    #[test]
    fn reader_decrypts_and_authenticates() {
        let entry = known_entry();
        let reader = AesReader::new(&entry[..], AesMode::Aes128, entry.len() as u64).unwrap();
        let mut valid = reader.validate(b"password").unwrap();
        let mut plain = Vec::new();
        valid.read_to_end(&mut plain).unwrap();
        assert_eq!(plain, PLAINTEXT);
    }

    #[test]
    fn wrong_password_is_rejected_before_decrypting() {
        let entry = known_entry();
        let reader = AesReader::new(&entry[..], AesMode::Aes128, entry.len() as u64).unwrap();
        assert!(matches!(
            reader.validate(b"passwort"),
            Err(ZipError::IncorrectPassword)
        ));
    }

    #[test]
    fn flipped_ciphertext_fails_authentication() {
        let mut entry = known_entry();
        entry[15] ^= 0x01;
        let reader = AesReader::new(&entry[..], AesMode::Aes128, entry.len() as u64).unwrap();
        let mut valid = reader.validate(b"password").unwrap();
        let err = valid.read_to_end(&mut Vec::new()).unwrap_err();
        assert!(matches!(ZipError::from(err), ZipError::AuthenticationFailed));
    }

    #[test]
    fn every_strength_round_trips() {
        for mode in [AesMode::Aes128, AesMode::Aes192, AesMode::Aes256] {
            let mut writer = AesWriter::new(Vec::new(), b"secret", mode).unwrap();
            writer.write_all(PLAINTEXT).unwrap();
            let entry = writer.finish().unwrap();
            assert_eq!(entry.len() as u64, PLAINTEXT.len() as u64 + overhead(mode));

            let mut valid = AesReader::new(&entry[..], mode, entry.len() as u64)
                .unwrap()
                .validate(b"secret")
                .unwrap();
            let mut plain = Vec::new();
            valid.read_to_end(&mut plain).unwrap();
            assert_eq!(plain, PLAINTEXT);
        }
    }
}
