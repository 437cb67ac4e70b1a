//! AES-CFB encryption of cookie payloads.
//!
//! Output is `base64(IV ‖ ciphertext)`. CFB is a stream mode, so decrypting
//! with the wrong key yields garbage instead of an error; integrity is the
//! signer's job, not ours.

use aes::{Aes128, Aes192, Aes256};
use base64::{Engine, engine::general_purpose::STANDARD};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use rand::RngCore;

use crate::error::{CookieError, Result};

/// AES block size, which is also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Largest plaintext accepted by [`Cipher::encrypt`] (64 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

#[derive(Clone, Copy)]
enum Mode {
    Encrypt,
    Decrypt,
}

/// Symmetric cipher for cookie values.
///
/// The key size selects AES-128, AES-192 or AES-256.
#[derive(Clone)]
pub struct Cipher {
    key: Vec<u8>,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("key", &"[REDACTED]")
            .field("bits", &(self.key.len() * 8))
            .finish()
    }
}

impl Cipher {
    /// Create a cipher, rejecting keys that are not 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        check_key_length(key)?;
        Ok(Self { key: key.to_vec() })
    }

    /// Encrypt `plaintext` under a freshly generated IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.len() > MAX_PAYLOAD_SIZE {
            return Err(CookieError::PayloadTooLarge(plaintext.len()));
        }

        let mut buf = vec![0u8; BLOCK_SIZE + plaintext.len()];
        let (iv, body) = buf.split_at_mut(BLOCK_SIZE);
        rand::rng().fill_bytes(iv);
        body.copy_from_slice(plaintext.as_bytes());

        apply(&self.key, iv, body, Mode::Encrypt)?;

        Ok(STANDARD.encode(&buf))
    }

    /// Decrypt a value produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let mut raw = STANDARD
            .decode(encoded)
            .map_err(|e| CookieError::Malformed(format!("invalid base64: {}", e)))?;

        if raw.len() < BLOCK_SIZE {
            return Err(CookieError::Malformed(format!(
                "ciphertext should be at least {} bytes, but is only {} bytes",
                BLOCK_SIZE,
                raw.len()
            )));
        }

        let (iv, body) = raw.split_at_mut(BLOCK_SIZE);
        apply(&self.key, iv, body, Mode::Decrypt)?;

        String::from_utf8(body.to_vec())
            .map_err(|_| CookieError::Malformed("plaintext is not valid UTF-8".to_string()))
    }
}

/// Encrypt `plaintext` with `key`.
pub fn encrypt(key: &[u8], plaintext: &str) -> Result<String> {
    Cipher::new(key)?.encrypt(plaintext)
}

/// Decrypt `encoded` with `key`.
pub fn decrypt(key: &[u8], encoded: &str) -> Result<String> {
    Cipher::new(key)?.decrypt(encoded)
}

fn check_key_length(key: &[u8]) -> Result<()> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CookieError::InvalidKeyLength(n)),
    }
}

macro_rules! cfb {
    ($aes:ty, $key:expr, $iv:expr, $buf:expr, $mode:expr) => {{
        let invalid = |_| CookieError::InvalidKeyLength($key.len());
        match $mode {
            Mode::Encrypt => Encryptor::<$aes>::new_from_slices($key, $iv)
                .map_err(invalid)?
                .encrypt($buf),
            Mode::Decrypt => Decryptor::<$aes>::new_from_slices($key, $iv)
                .map_err(invalid)?
                .decrypt($buf),
        }
    }};
}

/// Run CFB over `buf` in place.
fn apply(key: &[u8], iv: &[u8], buf: &mut [u8], mode: Mode) -> Result<()> {
    match key.len() {
        16 => cfb!(Aes128, key, iv, buf, mode),
        24 => cfb!(Aes192, key, iv, buf, mode),
        32 => cfb!(Aes256, key, iv, buf, mode),
        n => return Err(CookieError::InvalidKeyLength(n)),
    }
    Ok(())
}
