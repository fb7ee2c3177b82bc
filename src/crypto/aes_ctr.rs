use std::fmt;

use super::{AesCipher, AES_BLOCK_SIZE};

/// An AES-CTR key stream generator.
///
/// Implements the slightly non-standard AES-CTR variant used by WinZip AES encryption.
///
/// Typical AES-CTR implementations combine a nonce with a 64 bit counter. WinZIP AES instead uses
/// no nonce and also uses a different byte order (little endian) than NIST (big endian).
///
/// Encryption or decryption is performed by XOR-ing the bytes from the key stream with the
/// ciphertext/plaintext.
pub(crate) struct AesCtrZipKeyStream {
    /// Current AES counter.
    counter: u128,
    /// AES cipher instance.
    cipher: AesCipher,
    /// Stores the currently available keystream bytes.
    buffer: [u8; AES_BLOCK_SIZE],
    /// Number of bytes already used up from `buffer`.
    pos: usize,
}

impl fmt::Debug for AesCtrZipKeyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesCtrZipKeyStream(counter: {})", self.counter)
    }
}

impl AesCtrZipKeyStream {
    /// Creates a new zip variant AES-CTR key stream.
    pub fn new(cipher: AesCipher) -> AesCtrZipKeyStream {
        AesCtrZipKeyStream {
            counter: 1,
            cipher,
            buffer: [0u8; AES_BLOCK_SIZE],
            pos: AES_BLOCK_SIZE,
        }
    }

    /// Decrypt or encrypt given data.
    #[inline]
    pub fn crypt(&mut self, mut target: &mut [u8]) {
        while !target.is_empty() {
            if self.pos == AES_BLOCK_SIZE {
                // Note: AES block size is always 16 bytes, same as u128.
                self.buffer = self.counter.to_le_bytes();
                self.cipher.encrypt_block(&mut self.buffer);
                self.counter = self.counter.wrapping_add(1);
                self.pos = 0;
            }

            let target_len = target.len().min(AES_BLOCK_SIZE - self.pos);

            xor(
                &mut target[0..target_len],
                &self.buffer[self.pos..(self.pos + target_len)],
            );
            target = &mut target[target_len..];
            self.pos += target_len;
        }
    }
}

/// XORs a slice in place with another slice.
#[inline]
pub(crate) fn xor(dest: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dest.len(), src.len());

    for (lhs, rhs) in dest.iter_mut().zip(src.iter()) {
        *lhs ^= *rhs;
    }
}
