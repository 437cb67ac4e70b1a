//! Concrete identity providers, selected by name.

pub mod google;

use std::sync::Arc;

pub use google::{GoogleProvider, GoogleUserInfo, OAuthClientConfig};

use crate::error::{ProviderError, Result};
use crate::provider::Provider;

/// Names accepted by [`new`].
pub const SUPPORTED: &[&str] = &["google"];

/// Build the provider registered under `name` (case-insensitive).
pub fn new(name: &str, config: OAuthClientConfig) -> Result<Arc<dyn Provider>> {
    match name.to_lowercase().as_str() {
        "google" => Ok(Arc::new(GoogleProvider::new(config)?)),
        other => Err(ProviderError::Config(format!(
            "unknown provider '{}', expected one of: {}",
            other,
            SUPPORTED.join(", ")
        ))),
    }
}
