//! Error types for session handling.

use authgate_cookie::CookieError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while attaching or reading a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request carried no session cookie.
    #[error("Session cookie not present")]
    NotPresent,

    /// The session cookie failed signature, freshness, decryption or
    /// deserialization checks.
    #[error("Session cookie invalid")]
    Invalid,

    /// Minting a new session cookie failed.
    #[error("Cookie error: {0}")]
    Cookie(#[from] CookieError),

    /// Serializing a session record failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
