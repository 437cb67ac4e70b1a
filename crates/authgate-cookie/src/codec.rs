//! Encrypt-then-sign composition and cookie builders.

use axum_extra::extract::cookie::Cookie;
use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::cipher::Cipher;
use crate::error::{CookieError, Result};
use crate::signer;

/// Browser-side lifetime of every cookie authgate sets.
pub const COOKIE_MAX_AGE_SECS: i64 = 86400;

/// Name of the unsigned cookie carrying the OAuth2 CSRF nonce.
pub const CSRF_COOKIE_NAME: &str = "csrf_state";

const NONCE_LEN: usize = 16;

/// Build a cookie with the standard flags: `Path=/`, `HttpOnly`, `Secure`,
/// `Max-Age=86400`.
pub fn make_cookie(name: impl Into<String>, value: impl Into<String>) -> Cookie<'static> {
    Cookie::build((name.into(), value.into()))
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(time::Duration::seconds(COOKIE_MAX_AGE_SECS))
        .build()
}

/// Build a cookie that tells the browser to drop `name` immediately.
pub fn make_invalidation_cookie(name: impl Into<String>) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.into(), "")).path("/").build();
    cookie.make_removal();
    cookie
}

/// Build the CSRF cookie for `nonce`.
pub fn make_csrf_cookie(nonce: impl Into<String>) -> Cookie<'static> {
    make_cookie(CSRF_COOKIE_NAME, nonce)
}

/// 16 random bytes, base64url encoded.
pub fn nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Encrypt `plaintext` under `key`, then sign the ciphertext for cookie `name`.
pub fn encrypt_then_sign(
    key: &[u8],
    seed: &str,
    name: &str,
    plaintext: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let encrypted = Cipher::new(key)?.encrypt(plaintext)?;
    Ok(signer::sign(seed, name, &encrypted, now))
}

/// Inverse of [`encrypt_then_sign`].
///
/// Every failure collapses into [`CookieError::Validation`] so callers cannot
/// tell a bad signature from a bad ciphertext.
pub fn verify_then_decrypt(
    key: &[u8],
    seed: &str,
    name: &str,
    value: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<String> {
    let Some(verified) = signer::verify(name, value, seed, max_age, now) else {
        tracing::debug!(cookie = name, "cookie signature verification failed");
        return Err(CookieError::Validation);
    };

    Cipher::new(key)
        .and_then(|cipher| cipher.decrypt(&verified.value))
        .map_err(|e| {
            tracing::debug!(cookie = name, error = %e, "cookie decryption failed");
            CookieError::Validation
        })
}
