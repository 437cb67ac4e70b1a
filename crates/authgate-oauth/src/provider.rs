//! The identity provider contract.

use std::fmt::Debug;

use async_trait::async_trait;
use authgate_cookie::CSRF_COOKIE_NAME;
use authgate_session::SessionRecord;
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use url::Url;

use crate::error::{ProviderError, Result};

/// Static facts about a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderData {
    /// Display name, e.g. `Google`. Lowercased into the login/callback paths.
    pub name: String,
}

/// Tokens returned by a code exchange.
///
/// Scoped to one login: returned by [`Provider::exchange`], passed into
/// [`Provider::get_user`], then dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// A user profile as reported by an identity source.
pub trait User: Send + Sync + Debug {
    fn id(&self) -> &str;
    fn username(&self) -> &str;
    fn name(&self) -> &str;
    fn email(&self) -> &str;
}

/// An OAuth 2.0 identity provider.
///
/// Implementations are shared across concurrent requests and hold no
/// per-login state.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    fn data(&self) -> &ProviderData;

    /// Trade an authorization code for tokens.
    async fn exchange(&self, code: &str) -> Result<Token>;

    /// Fetch the profile of the user `token` belongs to.
    async fn get_user(&self, token: &Token) -> Result<Box<dyn User>>;

    fn login_path(&self) -> String {
        format!("/auth/{}/login", self.data().name.to_lowercase())
    }

    fn callback_path(&self) -> String {
        format!("/auth/{}/callback", self.data().name.to_lowercase())
    }

    /// Build the authorization URL, adding the CSRF cookie to `jar`.
    fn provider_login_url(&self, jar: CookieJar) -> Result<(CookieJar, Url)>;

    /// Whether an existing session still grants access.
    fn authenticate_session(&self, _record: &SessionRecord) -> bool {
        true
    }
}

/// Compare the callback `state` with the CSRF cookie in constant time.
///
/// A missing cookie is treated as a mismatch.
pub fn check_csrf_state(jar: &CookieJar, state: &str) -> Result<()> {
    let Some(cookie) = jar.get(CSRF_COOKIE_NAME) else {
        tracing::debug!("CSRF cookie missing on callback");
        return Err(ProviderError::InvalidCsrfState);
    };

    if bool::from(cookie.value().as_bytes().ct_eq(state.as_bytes())) {
        Ok(())
    } else {
        Err(ProviderError::InvalidCsrfState)
    }
}
