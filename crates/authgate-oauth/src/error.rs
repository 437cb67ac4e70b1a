//! Error types for identity providers.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during an OAuth 2.0 login.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The authorization URL could not be built.
    #[error("Failed to build authorization URL: {0}")]
    UrlBuild(String),

    /// The callback `state` did not match the CSRF cookie.
    #[error("Invalid CSRF state")]
    InvalidCsrfState,

    /// Trading the authorization code for tokens failed.
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    /// Fetching the user profile failed.
    #[error("Failed to fetch user info: {0}")]
    UserFetchFailed(String),

    /// Provider configuration is unusable.
    #[error("Config error: {0}")]
    Config(String),
}
