//! Identity sources for authgate.
//!
//! # Components
//!
//! - [`provider`]: the [`Provider`] contract, [`User`], per-login [`Token`], CSRF check
//! - [`providers`]: concrete providers selected by name (Google)
//! - [`local`]: in-memory username/password fallback

pub mod error;
pub mod local;
pub mod provider;
pub mod providers;

pub use error::{ProviderError, Result};
pub use local::{LocalAuth, LocalUser};
pub use provider::{Provider, ProviderData, Token, User, check_csrf_state};
pub use providers::{GoogleProvider, OAuthClientConfig};
