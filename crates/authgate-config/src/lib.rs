//! Configuration system for authgate.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides + explicit file)
//! - Environment overrides for the variables the proxy is deployed with
//! - Secret resolution (env var → config file, warning on plaintext)
//! - Startup validation of secrets, target URL and whitelist patterns

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;
pub mod validate;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    ResolvedSecret, SecretSource, apply_env_overrides, apply_env_overrides_with, resolve_secret,
};
pub use types::*;
pub use validate::KNOWN_PROVIDERS;
