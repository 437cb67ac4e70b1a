//! Google as an OAuth 2.0 identity provider.

use std::time::Duration;

use async_trait::async_trait;
use authgate_cookie::codec;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use url::Url;

use crate::error::{ProviderError, Result};
use crate::provider::{Provider, ProviderData, Token, User};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// OAuth client settings for an authorization-code provider.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the provider sends the browser back to, e.g.
    /// `https://<domain>/auth/google/callback`.
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Timeout for token and userinfo requests.
    pub timeout: Duration,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OAuthClientConfig {
    /// Settings pointing at Google's public endpoints.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Profile returned by Google's userinfo endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "verified_email")]
    pub verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub hd: String,
}

impl User for GoogleUserInfo {
    fn id(&self) -> &str {
        &self.id
    }

    fn username(&self) -> &str {
        &self.email
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug)]
pub struct GoogleProvider {
    data: ProviderData,
    config: OAuthClientConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: OAuthClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            data: ProviderData {
                name: "Google".to_string(),
            },
            config,
            client,
        })
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn data(&self) -> &ProviderData {
        &self.data
    }

    async fn exchange(&self, code: &str) -> Result<Token> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::ExchangeFailed(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ExchangeFailed(format!(
                "token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::ExchangeFailed(format!("failed to parse token response: {}", e))
        })?;

        if body.access_token.is_empty() {
            return Err(ProviderError::ExchangeFailed(
                "token response carried no access token".to_string(),
            ));
        }

        Ok(Token {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expiry: body
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn get_user(&self, token: &Token) -> Result<Box<dyn User>> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::UserFetchFailed(format!("userinfo request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UserFetchFailed(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::UserFetchFailed(format!("failed to read response: {}", e)))?;

        let user: GoogleUserInfo = serde_json::from_str(&body).map_err(|e| {
            tracing::info!(error = %e, data = %body, "Failed to unmarshal Google userinfo");
            ProviderError::UserFetchFailed("failed to unmarshal Google userinfo".to_string())
        })?;

        Ok(Box::new(user))
    }

    fn provider_login_url(&self, jar: CookieJar) -> Result<(CookieJar, Url)> {
        let mut url = Url::parse(&self.config.auth_url).map_err(|e| {
            tracing::error!(error = %e, "Failed to generate an authentication url");
            ProviderError::UrlBuild(e.to_string())
        })?;

        let nonce = codec::nonce();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &nonce);

        Ok((jar.add(codec::make_csrf_cookie(nonce)), url))
    }
}
