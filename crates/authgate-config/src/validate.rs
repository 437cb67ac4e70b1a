//! Startup validation.
//!
//! Anything wrong here is fatal: the proxy must not serve traffic with a
//! missing secret or an unusable key.

use regex::Regex;

use crate::{AuthgateConfig, ConfigError, Result};

/// Provider names the server knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["google"];

impl AuthgateConfig {
    /// Check that the config is complete enough to start the proxy.
    ///
    /// Call after environment overrides have been applied.
    pub fn validate(&self) -> Result<()> {
        let cookie = self.cookie();
        if cookie.seed.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::missing(
                "cookie.seed",
                "set it in config or via COOKIE_SEED",
            ));
        }

        let key = cookie.key.filter(|k| !k.is_empty()).ok_or_else(|| {
            ConfigError::missing("cookie.key", "set it in config or via COOKIE_KEY")
        })?;
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(ConfigError::invalid(
                "cookie.key",
                format!("must be 16, 24 or 32 bytes, got {}", key.len()),
            ));
        }

        self.upstream().target_url()?;

        let whitelist = self.whitelist();
        for (field, patterns) in [
            ("whitelist.paths", &whitelist.paths),
            ("whitelist.domains", &whitelist.domains),
        ] {
            for pattern in patterns {
                Regex::new(pattern).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
            }
        }

        let provider = self.provider();
        if !KNOWN_PROVIDERS.contains(&provider.name.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "provider.name",
                format!(
                    "unknown provider '{}', expected one of: {}",
                    provider.name,
                    KNOWN_PROVIDERS.join(", ")
                ),
            ));
        }
        for (field, value, env) in [
            ("provider.client_id", &provider.client_id, "GOOGLE_OAUTH_CLIENT_ID"),
            (
                "provider.client_secret",
                &provider.client_secret,
                "GOOGLE_OAUTH_CLIENT_SECRET",
            ),
            (
                "provider.callback_url",
                &provider.callback_url,
                "GOOGLE_OAUTH_CALLBACK_URL",
            ),
        ] {
            if value.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::missing(
                    field,
                    format!("set it in config or via {}", env),
                ));
            }
        }

        let paths = self.paths();
        for path in [
            &paths.error,
            &paths.login,
            &paths.logout,
            &paths.reset,
            &paths.signup,
            &paths.static_prefix,
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(
                    "paths",
                    format!("'{}' must start with '/'", path),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthgateConfig {
        AuthgateConfig::from_toml(
            r#"
[upstream]
target = "http://localhost:3000"

[cookie]
seed = "0123456789abcdefghijklmnopqrstuv"
key = "0123456789abcdef"

[provider]
client_id = "id"
client_secret = "secret"
callback_url = "https://app/auth/google/callback"

[whitelist]
paths = ["^/public/"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config() {
        valid().validate().unwrap();
    }

    #[test]
    fn test_missing_seed() {
        let mut config = valid();
        config.cookie.as_mut().unwrap().seed = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "cookie.seed"));
    }

    #[test]
    fn test_key_lengths() {
        for len in [16, 24, 32] {
            let mut config = valid();
            config.cookie.as_mut().unwrap().key = Some("k".repeat(len));
            assert!(config.validate().is_ok(), "length {} should be accepted", len);
        }
        for len in [15, 17, 25, 33] {
            let mut config = valid();
            config.cookie.as_mut().unwrap().key = Some("k".repeat(len));
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidField { ref field, .. } if field == "cookie.key"),
                "length {} should be rejected",
                len
            );
        }
    }

    #[test]
    fn test_missing_target() {
        let mut config = valid();
        config.upstream = None;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::MissingField { ref field, .. } if field == "upstream.target"
        ));
    }

    #[test]
    fn test_bad_whitelist_regex() {
        let mut config = valid();
        config.whitelist.as_mut().unwrap().domains = vec!["(unclosed".to_string()];
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidField { ref field, .. } if field == "whitelist.domains"
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = valid();
        config.provider.as_mut().unwrap().name = "okta".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidField { ref field, .. } if field == "provider.name"
        ));
    }

    #[test]
    fn test_missing_client_secret() {
        let mut config = valid();
        config.provider.as_mut().unwrap().client_secret = None;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::MissingField { ref field, .. } if field == "provider.client_secret"
        ));
    }

    #[test]
    fn test_relative_path_rejected() {
        let mut config = valid();
        config.paths = Some(crate::PathsConfig {
            login: "auth/login".to_string(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }
}
