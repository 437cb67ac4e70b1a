//! Cookie engine for authgate.
//!
//! Session state lives entirely in the browser, so every value authgate hands
//! out has to be both opaque and tamper-evident. This crate layers three
//! pieces to get there:
//!
//! - [`cipher`]: AES in CFB mode with a fresh IV per call (confidentiality)
//! - [`signer`]: HMAC-SHA256 `value|timestamp|signature` tokens (integrity
//!   and freshness)
//! - [`codec`]: encrypt-then-sign composition plus cookie builders
//!
//! ```rust,ignore
//! use authgate_cookie::codec;
//!
//! let value = codec::encrypt_then_sign(key, seed, "session", "{\"id\":\"42\"}", Utc::now())?;
//! let payload = codec::verify_then_decrypt(key, seed, "session", &value, max_age, Utc::now())?;
//! ```

pub mod cipher;
pub mod codec;
pub mod error;
pub mod signer;

pub use cipher::Cipher;
pub use codec::{
    COOKIE_MAX_AGE_SECS, CSRF_COOKIE_NAME, encrypt_then_sign, make_cookie, make_csrf_cookie,
    make_invalidation_cookie, nonce, verify_then_decrypt,
};
pub use error::{CookieError, Result};
pub use signer::{MAX_CLOCK_SKEW, Verified, sign, verify};

/// Re-exported so downstream crates build cookies against the same type.
pub use axum_extra::extract::cookie::Cookie;
