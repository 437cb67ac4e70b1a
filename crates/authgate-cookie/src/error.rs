//! Error types for the cookie engine.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, CookieError>;

/// Errors produced while encrypting, signing or validating cookie values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    /// AES keys must be 16, 24 or 32 bytes.
    #[error("invalid key length {0}: expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),

    /// Plaintext exceeds the encryption size limit.
    #[error("payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    /// Ciphertext could not be decoded or is shorter than one block.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Signature, format, freshness or decryption check failed.
    ///
    /// Deliberately carries no detail about which stage rejected the value.
    #[error("cookie value failed validation")]
    Validation,
}
