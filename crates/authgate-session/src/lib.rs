//! Client-held sessions for authgate.
//!
//! There is no server-side session table. A [`SessionRecord`] is serialized to
//! JSON, encrypted, signed, and handed to the browser as the `session` cookie;
//! reading a session is the reverse. Revoking a session means overwriting the
//! cookie with an immediately-expiring one.

pub mod error;

use authgate_cookie::{Cipher, Cookie, codec};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

pub use error::{Result, SessionError};

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "session";

/// How long a session cookie's content stays valid, independent of the
/// cookie's own `Max-Age`.
pub const MAX_SESSION_DURATION: Duration = Duration::days(30);

/// The identity embedded in a session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub authorized: bool,
}

impl SessionRecord {
    /// A freshly authenticated, not yet authorized, record.
    pub fn unauthorized(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            authorized: false,
        }
    }
}

/// Turns [`SessionRecord`]s into cookies and back.
///
/// Owns the signing seed and the encryption key for the lifetime of the
/// process.
#[derive(Clone)]
pub struct SessionManager {
    seed: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("seed", &"[REDACTED]")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SessionManager {
    /// Create a manager, rejecting keys the cipher cannot use.
    pub fn new(seed: impl Into<String>, key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        Cipher::new(&key)?;
        Ok(Self {
            seed: seed.into(),
            key,
        })
    }

    /// The signing seed, for other signed cookies sharing this deployment's
    /// secret.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Serialize `record` into a new session cookie on `jar`.
    pub fn attach_session(&self, jar: CookieJar, record: &SessionRecord) -> Result<CookieJar> {
        let payload = serde_json::to_string(record)?;
        let cookie = self.make_session_cookie(&payload)?;
        tracing::debug!(session_id = %record.id, "Attached session cookie");
        Ok(jar.add(cookie))
    }

    /// Read the session record from `jar`.
    pub fn read_session(&self, jar: &CookieJar) -> Result<SessionRecord> {
        let cookie = jar
            .get(SESSION_COOKIE_NAME)
            .ok_or(SessionError::NotPresent)?;
        let payload = self
            .read_session_cookie(cookie)
            .map_err(|_| SessionError::Invalid)?;
        serde_json::from_str(&payload).map_err(|e| {
            tracing::debug!(error = %e, "Session payload is not a valid record");
            SessionError::Invalid
        })
    }

    /// Replace any session cookie with an immediately-expiring one.
    pub fn remove_session(&self, jar: CookieJar) -> CookieJar {
        jar.add(codec::make_invalidation_cookie(SESSION_COOKIE_NAME))
    }

    /// Encrypt and sign `payload` into a session cookie.
    pub fn make_session_cookie(&self, payload: &str) -> Result<Cookie<'static>> {
        let value =
            codec::encrypt_then_sign(&self.key, &self.seed, SESSION_COOKIE_NAME, payload, Utc::now())?;
        Ok(codec::make_cookie(SESSION_COOKIE_NAME, value))
    }

    /// Verify and decrypt a session cookie back into its payload.
    pub fn read_session_cookie(&self, cookie: &Cookie<'_>) -> Result<String> {
        codec::verify_then_decrypt(
            &self.key,
            &self.seed,
            SESSION_COOKIE_NAME,
            cookie.value(),
            MAX_SESSION_DURATION,
            Utc::now(),
        )
        .map_err(|_| SessionError::Invalid)
    }
}
