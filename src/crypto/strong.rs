//! PKWARE strong encryption with AES.
//!
//! Every payload starts with a [`DecryptionHeader`]. A random session value is
//! stored encrypted under a key derived from the password (the ERD), the file
//! key is derived from the IV and that value, and the validation data lets the
//! reader detect a wrong password before any payload is decrypted. The
//! payload is AES-CBC with PKCS#7 padding.

use std::io;
use std::io::prelude::*;

use sha1::{Digest, Sha1};

use super::aes_ctr::xor;
use super::{AesCipher, AES_BLOCK_SIZE};
use crate::codec::{DataInput, DataOutput};
use crate::result::{ZipError, ZipResult};
use crate::spec::DecryptionHeader;
use crate::types::AesMode;

type Block = [u8; AES_BLOCK_SIZE];

const VALIDATION_RANDOM_LENGTH: usize = 12;
const READ_CHUNK: u64 = 4096;

/// Expands a SHA-1 hash into 40 bytes of key material with the
/// ipad/opad construction of CryptDeriveKey.
pub(crate) fn derive_key(hash: &[u8]) -> [u8; 40] {
    let mut b1 = [0x36u8; 64];
    let mut b2 = [0x5Cu8; 64];
    for (i, byte) in hash.iter().enumerate().take(64) {
        b1[i] ^= byte;
        b2[i] ^= byte;
    }
    let mut key = [0u8; 40];
    key[..20].copy_from_slice(&Sha1::digest(b1));
    key[20..].copy_from_slice(&Sha1::digest(b2));
    key
}

fn password_cipher(password: &[u8], mode: AesMode) -> ZipResult<AesCipher> {
    let key = derive_key(&Sha1::digest(password));
    AesCipher::new(&key[..mode.key_length()])
}

fn file_cipher(iv: &Block, random: &[u8], mode: AesMode) -> ZipResult<AesCipher> {
    let mut hasher = Sha1::new();
    hasher.update(iv);
    hasher.update(random);
    let key = derive_key(&hasher.finalize());
    AesCipher::new(&key[..mode.key_length()])
}

fn cbc_encrypt(cipher: &AesCipher, chain: &mut Block, data: &mut [u8]) {
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        xor(block, chain);
        cipher.encrypt_block(block);
        chain.copy_from_slice(block);
    }
}

fn cbc_decrypt(cipher: &AesCipher, chain: &mut Block, data: &mut [u8]) {
    let mut next_chain = [0u8; AES_BLOCK_SIZE];
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        next_chain.copy_from_slice(block);
        cipher.decrypt_block(block);
        xor(block, chain);
        *chain = next_chain;
    }
}

/// The IV used for a header: its stored IV, or the CRC-32 and size of the
/// entry when the stored one is shorter than a block.
pub(crate) fn effective_iv(iv: &[u8], crc32: u32, uncompressed_size: u64) -> Block {
    let mut block = [0u8; AES_BLOCK_SIZE];
    if iv.len() >= AES_BLOCK_SIZE {
        block.copy_from_slice(&iv[..AES_BLOCK_SIZE]);
    } else {
        block[..4].copy_from_slice(&crc32.to_le_bytes());
        block[4..12].copy_from_slice(&uncompressed_size.to_le_bytes());
    }
    block
}

fn new_header(password: &[u8], mode: AesMode) -> ZipResult<(DecryptionHeader, AesCipher, Block)> {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    super::fill_random(&mut iv)?;

    let erd_length = (mode.key_length() + AES_BLOCK_SIZE - 1) / AES_BLOCK_SIZE * AES_BLOCK_SIZE;
    let mut random = vec![0u8; erd_length];
    super::fill_random(&mut random)?;
    let mut erd = random.clone();
    cbc_encrypt(&password_cipher(password, mode)?, &mut iv.clone(), &mut erd);

    let cipher = file_cipher(&iv, &random, mode)?;
    let mut vdata = vec![0u8; VALIDATION_RANDOM_LENGTH + 4];
    super::fill_random(&mut vdata[..VALIDATION_RANDOM_LENGTH])?;
    let check = crc32fast::hash(&vdata[..VALIDATION_RANDOM_LENGTH]);
    vdata[VALIDATION_RANDOM_LENGTH..].copy_from_slice(&check.to_le_bytes());
    cbc_encrypt(&cipher, &mut iv.clone(), &mut vdata);

    let header = DecryptionHeader {
        iv: iv.to_vec(),
        format: DecryptionHeader::FORMAT,
        alg_id: mode.alg_id(),
        bit_length: mode.bit_length(),
        flags: DecryptionHeader::FLAG_PASSWORD,
        erd,
        vcrc32: crc32fast::hash(&vdata),
        vdata,
    };
    Ok((header, cipher, iv))
}

fn open_header(
    header: &DecryptionHeader,
    password: &[u8],
    crc32: u32,
    uncompressed_size: u64,
) -> ZipResult<(AesCipher, Block)> {
    let mode = AesMode::from_alg_id(header.alg_id).ok_or(ZipError::UnsupportedArchive(
        "unsupported strong encryption algorithm",
    ))?;
    if header.erd.is_empty() || header.erd.len() % AES_BLOCK_SIZE != 0 {
        return Err(ZipError::MalformedRecord("encrypted random data is not block aligned"));
    }
    if header.vdata.len() < AES_BLOCK_SIZE || header.vdata.len() % AES_BLOCK_SIZE != 0 {
        return Err(ZipError::MalformedRecord("validation data is not block aligned"));
    }
    let iv = effective_iv(&header.iv, crc32, uncompressed_size);

    let mut random = header.erd.clone();
    cbc_decrypt(&password_cipher(password, mode)?, &mut iv.clone(), &mut random);
    let cipher = file_cipher(&iv, &random, mode)?;

    let mut vdata = header.vdata.clone();
    cbc_decrypt(&cipher, &mut iv.clone(), &mut vdata);
    let (data, check) = vdata.split_at(vdata.len() - 4);
    if crc32fast::hash(data).to_le_bytes() != check {
        return Err(ZipError::IncorrectPassword);
    }
    Ok((cipher, iv))
}

/// Decrypting reader over a payload that starts with its decryption header.
pub(crate) struct StrongReader<R> {
    reader: io::Take<R>,
    cipher: AesCipher,
    chain: Block,
    ready: Vec<u8>,
    ready_pos: usize,
    held: Option<Block>,
    done: bool,
}

impl<R: Read> StrongReader<R> {
    /// Reads and validates the decryption header. `compressed_size` covers
    /// the header and the ciphertext.
    pub fn new(
        mut reader: R,
        password: &[u8],
        crc32: u32,
        uncompressed_size: u64,
        compressed_size: u64,
    ) -> ZipResult<StrongReader<R>> {
        let header = DecryptionHeader::read(&mut DataInput::new(&mut reader))?;
        let ciphertext_length = compressed_size
            .checked_sub(header.len())
            .ok_or(ZipError::MalformedRecord("decryption header exceeds the entry"))?;
        if ciphertext_length == 0 || ciphertext_length % AES_BLOCK_SIZE as u64 != 0 {
            return Err(ZipError::MalformedRecord("ciphertext is not block aligned"));
        }
        let (cipher, chain) = open_header(&header, password, crc32, uncompressed_size)?;
        Ok(StrongReader {
            reader: reader.take(ciphertext_length),
            cipher,
            chain,
            ready: Vec::new(),
            ready_pos: 0,
            held: None,
            done: false,
        })
    }

    /// Decrypts the next chunk, always holding back the last block until the
    /// end so its padding can be removed.
    fn fill(&mut self) -> ZipResult<()> {
        let mut chunk = Vec::with_capacity(READ_CHUNK as usize);
        (&mut self.reader).take(READ_CHUNK).read_to_end(&mut chunk)?;
        self.ready.clear();
        self.ready_pos = 0;

        if chunk.is_empty() {
            if self.reader.limit() != 0 {
                return Err(ZipError::MalformedRecord("strong encrypted payload is truncated"));
            }
            let block = self
                .held
                .take()
                .ok_or(ZipError::MalformedRecord("strong encrypted payload is empty"))?;
            let pad = block[AES_BLOCK_SIZE - 1] as usize;
            if pad == 0
                || pad > AES_BLOCK_SIZE
                || block[AES_BLOCK_SIZE - pad..].iter().any(|&b| b as usize != pad)
            {
                return Err(ZipError::MalformedRecord("invalid padding in strong encrypted payload"));
            }
            self.ready.extend_from_slice(&block[..AES_BLOCK_SIZE - pad]);
            self.done = true;
            return Ok(());
        }
        if chunk.len() % AES_BLOCK_SIZE != 0 {
            return Err(ZipError::MalformedRecord("strong encrypted payload is truncated"));
        }

        cbc_decrypt(&self.cipher, &mut self.chain, &mut chunk);
        if let Some(held) = self.held.take() {
            self.ready.extend_from_slice(&held);
        }
        let (body, last) = chunk.split_at(chunk.len() - AES_BLOCK_SIZE);
        self.ready.extend_from_slice(body);
        let mut block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(last);
        self.held = Some(block);
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read> Read for StrongReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.ready_pos == self.ready.len() {
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            self.fill()?;
        }
        let count = buf.len().min(self.ready.len() - self.ready_pos);
        buf[..count].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + count]);
        self.ready_pos += count;
        Ok(count)
    }
}

/// Encrypting writer; writes the decryption header on creation and the
/// padded final block on [`StrongWriter::finish`].
pub(crate) struct StrongWriter<W> {
    writer: W,
    cipher: AesCipher,
    chain: Block,
    pending: Vec<u8>,
}

impl<W: Write> StrongWriter<W> {
    pub fn new(mut writer: W, password: &[u8], mode: AesMode) -> ZipResult<StrongWriter<W>> {
        let (header, cipher, chain) = new_header(password, mode)?;
        header.write(&mut DataOutput::new(&mut writer))?;
        Ok(StrongWriter {
            writer,
            cipher,
            chain,
            pending: Vec::new(),
        })
    }

    pub fn finish(mut self) -> ZipResult<W> {
        let pad = AES_BLOCK_SIZE - self.pending.len() % AES_BLOCK_SIZE;
        self.pending.extend(std::iter::repeat(pad as u8).take(pad));
        cbc_encrypt(&self.cipher, &mut self.chain, &mut self.pending);
        self.writer.write_all(&self.pending)?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for StrongWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let full = self.pending.len() / AES_BLOCK_SIZE * AES_BLOCK_SIZE;
        if full > 0 {
            cbc_encrypt(&self.cipher, &mut self.chain, &mut self.pending[..full]);
            self.writer.write_all(&self.pending[..full])?;
            self.pending.drain(..full);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Encrypts an encoded central directory as one payload.
pub(crate) fn encrypt_central_directory(
    plain: &[u8],
    password: &[u8],
    mode: AesMode,
) -> ZipResult<Vec<u8>> {
    let mut writer = StrongWriter::new(Vec::new(), password, mode)?;
    writer.write_all(plain)?;
    writer.finish()
}

/// Reverses [`encrypt_central_directory`].
pub(crate) fn decrypt_central_directory(
    data: &[u8],
    password: &[u8],
    original_size: u64,
) -> ZipResult<Vec<u8>> {
    let mut reader = StrongReader::new(data, password, 0, original_size, data.len() as u64)?;
    let mut plain = Vec::new();
    reader.read_to_end(&mut plain)?;
    if plain.len() as u64 != original_size {
        return Err(ZipError::SizeMismatch {
            expected: original_size,
            actual: plain.len() as u64,
        });
    }
    Ok(plain)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_derivation_vector() {
        let key = derive_key(&Sha1::digest(b"password"));
        assert_eq!(
            key[..16],
            [
                0xa3, 0xbc, 0x50, 0x87, 0x53, 0x27, 0x48, 0x27, 0xcf, 0x25, 0x15, 0x60, 0x0e, 0xae,
                0xa3, 0x2c
            ]
        );
        assert_eq!(key[39], 0x7c);
    }

    fn encrypt(plain: &[u8], mode: AesMode) -> Vec<u8> {
        let mut writer = StrongWriter::new(Vec::new(), b"strong", mode).unwrap();
        for chunk in plain.chunks(5) {
            writer.write_all(chunk).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn payloads_round_trip_across_block_boundaries() {
        for len in [0usize, 1, 15, 16, 17, 4095, 4096, 4097, 10_000] {
            let plain: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for mode in [AesMode::Aes128, AesMode::Aes192, AesMode::Aes256] {
                let data = encrypt(&plain, mode);
                let mut reader =
                    StrongReader::new(&data[..], b"strong", 0, len as u64, data.len() as u64)
                        .unwrap();
                let mut back = Vec::new();
                reader.read_to_end(&mut back).unwrap();
                assert_eq!(back, plain, "length {} mode {:?}", len, mode);
            }
        }
    }

    #[test]
    fn wrong_password_is_detected_by_validation_data() {
        let data = encrypt(b"secret contents", AesMode::Aes256);
        assert!(matches!(
            StrongReader::new(&data[..], b"weak", 0, 15, data.len() as u64),
            Err(ZipError::IncorrectPassword)
        ));
    }

    #[test]
    fn central_directory_payload() {
        let plain = vec![0x50u8; 300];
        let data = encrypt_central_directory(&plain, b"cd", AesMode::Aes128).unwrap();
        assert_eq!(decrypt_central_directory(&data, b"cd", 300).unwrap(), plain);
        assert!(matches!(
            decrypt_central_directory(&data, b"cd", 301),
            Err(ZipError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn short_iv_is_built_from_crc_and_size() {
        let iv = effective_iv(&[], 0x11223344, 0x0102);
        assert_eq!(iv[..6], [0x44, 0x33, 0x22, 0x11, 0x02, 0x01]);
        assert_eq!(iv[12..], [0, 0, 0, 0]);
    }
}
