//! HMAC-SHA256 signed cookie values.
//!
//! A signed value has three `|`-separated parts:
//!
//! ```text
//! base64url(value) | unix-seconds | base64url(HMAC(seed, name ‖ base64url(value) ‖ unix-seconds))
//! ```
//!
//! The browser never sends the cookie's expiry back, so freshness is judged
//! from the embedded creation timestamp instead.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How far in the future a creation timestamp may lie before it is rejected.
pub const MAX_CLOCK_SKEW: Duration = Duration::minutes(5);

/// A successfully verified value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// The original (decoded) value.
    pub value: String,
    /// When the value was signed.
    pub created_at: DateTime<Utc>,
}

/// Sign `value` for the cookie `name` at time `now`.
pub fn sign(seed: &str, name: &str, value: &str, now: DateTime<Utc>) -> String {
    let encoded = URL_SAFE.encode(value.as_bytes());
    let timestamp = now.timestamp().to_string();
    let signature = URL_SAFE.encode(mac(seed, name, &encoded, &timestamp).finalize().into_bytes());
    format!("{}|{}|{}", encoded, timestamp, signature)
}

/// Verify a signed value for the cookie `name`.
///
/// Returns `None` unless the token has exactly three parts, the signature
/// matches (compared in constant time), and the creation time falls inside
/// `(now - max_age, now + MAX_CLOCK_SKEW)`.
pub fn verify(
    name: &str,
    token: &str,
    seed: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Option<Verified> {
    let parts: Vec<&str> = token.split('|').collect();
    let [encoded, timestamp, signature] = parts.as_slice() else {
        return None;
    };

    let signature = URL_SAFE.decode(signature).ok()?;
    mac(seed, name, encoded, timestamp)
        .verify_slice(&signature)
        .ok()?;

    let created_at = DateTime::from_timestamp(timestamp.parse::<i64>().ok()?, 0)?;
    if created_at <= now - max_age || created_at >= now + MAX_CLOCK_SKEW {
        tracing::debug!(name, %created_at, "signed value outside freshness window");
        return None;
    }

    let value = String::from_utf8(URL_SAFE.decode(encoded).ok()?).ok()?;
    Some(Verified { value, created_at })
}

fn mac(seed: &str, name: &str, encoded: &str, timestamp: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so construction cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(seed.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(name.as_bytes());
    mac.update(encoded.as_bytes());
    mac.update(timestamp.as_bytes());
    mac
}
