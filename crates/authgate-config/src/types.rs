//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]          # listen address, request timeout
//! [upstream]        # target URL, bearer token, injected headers
//! [cookie]          # signing seed and encryption key
//! [paths]           # control endpoint paths
//! [whitelist]       # path/domain regexes that bypass the gate
//! [provider]        # OAuth 2.0 identity provider
//! [pages]           # templates, static assets, contact details
//! [logging]         # level, format, optional file output
//! [[local_users]]   # in-memory username/password fallback
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthgateConfig {
    pub server: Option<ServerConfig>,
    pub upstream: Option<UpstreamConfig>,
    pub cookie: Option<CookieConfig>,
    pub paths: Option<PathsConfig>,
    pub whitelist: Option<WhitelistConfig>,
    pub provider: Option<ProviderConfig>,
    pub pages: Option<PagesConfig>,
    pub logging: Option<LoggingConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_users: Vec<LocalUserConfig>,
}

impl AuthgateConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: AuthgateConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.upstream.is_some() {
            self.upstream = other.upstream;
        }

        if other.cookie.is_some() {
            self.cookie = other.cookie;
        }

        if other.paths.is_some() {
            self.paths = other.paths;
        }

        if other.whitelist.is_some() {
            self.whitelist = other.whitelist;
        }

        if other.provider.is_some() {
            self.provider = other.provider;
        }

        if other.pages.is_some() {
            self.pages = other.pages;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }

        if !other.local_users.is_empty() {
            self.local_users = other.local_users;
        }
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn upstream(&self) -> UpstreamConfig {
        self.upstream.clone().unwrap_or_default()
    }

    pub fn cookie(&self) -> CookieConfig {
        self.cookie.clone().unwrap_or_default()
    }

    pub fn paths(&self) -> PathsConfig {
        self.paths.clone().unwrap_or_default()
    }

    pub fn whitelist(&self) -> WhitelistConfig {
        self.whitelist.clone().unwrap_or_default()
    }

    pub fn provider(&self) -> ProviderConfig {
        self.provider.clone().unwrap_or_default()
    }

    pub fn pages(&self) -> PagesConfig {
        self.pages.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Overall timeout for one inbound request, in seconds.
    pub request_timeout_secs: u64,
    /// Emit one structured log line per request.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "0.0.0.0".to_string(),
            request_timeout_secs: 60,
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream
// ─────────────────────────────────────────────────────────────────────────────

/// The service authgate forwards to.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Target URL, e.g. `http://localhost:3000`. A bare `host:port` is taken
    /// as plain HTTP.
    pub target: Option<String>,
    /// Bearer token sent as `Authorization` on authenticated requests.
    pub token: Option<String>,
    /// Headers added to every forwarded request.
    pub headers: BTreeMap<String, String>,
    /// Headers added only to authenticated or whitelisted requests.
    pub authenticated_headers: BTreeMap<String, String>,
    pub connect_timeout_secs: u64,
    /// Overall upstream timeout; unset means no limit beyond the server's
    /// request timeout.
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("target", &self.target)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field(
                "authenticated_headers",
                &self.authenticated_headers.keys().collect::<Vec<_>>(),
            )
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: None,
            token: None,
            headers: BTreeMap::new(),
            authenticated_headers: BTreeMap::new(),
            connect_timeout_secs: 10,
            timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    /// Parse the target into a URL, defaulting the scheme to `http`.
    pub fn target_url(&self) -> crate::Result<url::Url> {
        let raw = self
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                crate::ConfigError::missing("upstream.target", "set it in config or via TARGET")
            })?;

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = url::Url::parse(&with_scheme)
            .map_err(|e| crate::ConfigError::invalid("upstream.target", e.to_string()))?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(crate::ConfigError::invalid(
                "upstream.target",
                format!("'{}' is not an http(s) URL with a host", raw),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cookie secrets
// ─────────────────────────────────────────────────────────────────────────────

/// Secrets for the session cookie.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// HMAC signing seed.
    pub seed: Option<String>,
    /// AES key; must be 16, 24 or 32 bytes.
    pub key: Option<String>,
}

impl std::fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieConfig")
            .field("seed", &self.seed.as_ref().map(|_| "[REDACTED]"))
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Control endpoint paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub error: String,
    pub login: String,
    pub logout: String,
    pub reset: String,
    pub signup: String,
    /// Prefix under which static assets are served.
    pub static_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            error: "/auth/error".to_string(),
            login: "/auth/login".to_string(),
            logout: "/auth/logout".to_string(),
            reset: "/auth/reset".to_string(),
            signup: "/auth/signup".to_string(),
            static_prefix: "/static".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Whitelist
// ─────────────────────────────────────────────────────────────────────────────

/// Requests matching any of these bypass the session check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Regexes matched against the request path.
    pub paths: Vec<String>,
    /// Regexes matched against the request host.
    pub domains: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth 2.0 identity provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name, e.g. `google`.
    pub name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Where the provider redirects back to, e.g.
    /// `https://<domain>/auth/google/callback`.
    pub callback_url: Option<String>,
    /// Requested scopes; empty means the provider default.
    pub scopes: Vec<String>,
    /// Endpoint overrides; unset means the provider default.
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    /// Timeout for token and userinfo requests, in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("callback_url", &self.callback_url)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "google".to_string(),
            client_id: None,
            client_secret: None,
            callback_url: None,
            scopes: Vec::new(),
            auth_url: None,
            token_url: None,
            userinfo_url: None,
            timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pages
// ─────────────────────────────────────────────────────────────────────────────

/// Login/error pages and static assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Directory of `*.hbs` templates overriding the built-in pages.
    pub template_dir: Option<PathBuf>,
    /// Directory served under the static prefix.
    pub static_dir: Option<PathBuf>,
    /// Link shown on the error and signup pages.
    pub homepage_url: Option<String>,
    /// Contact shown on the error page.
    pub contact_email: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Directory for daily-rotated JSON log files; unset disables file output.
    pub dir: Option<PathBuf>,
    /// File name prefix inside `dir`.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            dir: None,
            file_prefix: "authgate".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local users
// ─────────────────────────────────────────────────────────────────────────────

/// One `[[local_users]]` entry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalUserConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LocalUserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUserConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AuthgateConfig::from_toml("").unwrap();
        assert_eq!(config, AuthgateConfig::new());
        assert_eq!(config.server().port, 8080);
        assert_eq!(config.paths().login, "/auth/login");
        assert_eq!(config.paths().static_prefix, "/static");
        assert_eq!(config.provider().name, "google");
        assert_eq!(config.logging().format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_full_config() {
        let config = AuthgateConfig::from_toml(
            r#"
[server]
port = 9000
bind = "127.0.0.1"

[upstream]
target = "http://localhost:3000/app"
token = "upstream-token"
connect_timeout_secs = 5

[upstream.headers]
X-Env = "prod"

[cookie]
seed = "seed"
key = "0123456789abcdef"

[paths]
login = "/signin"

[whitelist]
paths = ["^/public/", "^/health"]
domains = ["^open\\."]

[provider]
name = "google"
client_id = "id"
token_url = "http://idp/token"

[pages]
homepage_url = "https://example.com"

[logging]
format = "json"
dir = "/var/log/authgate"

[[local_users]]
username = "admin"
password = "hunter2"
"#,
        )
        .unwrap();

        let server = config.server();
        assert_eq!(server.port, 9000);
        assert_eq!(server.bind, "127.0.0.1");
        assert_eq!(server.request_timeout_secs, 60);

        let upstream = config.upstream();
        assert_eq!(upstream.token.as_deref(), Some("upstream-token"));
        assert_eq!(upstream.headers["X-Env"], "prod");
        assert_eq!(upstream.connect_timeout_secs, 5);

        let paths = config.paths();
        assert_eq!(paths.login, "/signin");
        assert_eq!(paths.logout, "/auth/logout");

        assert_eq!(config.whitelist().paths.len(), 2);
        assert_eq!(config.whitelist().domains, vec!["^open\\.".to_string()]);
        assert_eq!(config.provider().token_url.as_deref(), Some("http://idp/token"));
        assert_eq!(config.logging().format, LogFormat::Json);
        assert_eq!(config.local_users.len(), 1);
        assert_eq!(config.local_users[0].username, "admin");
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = AuthgateConfig::from_toml(
            r#"
[server]
port = 8080

[paths]
login = "/base-login"
"#,
        )
        .unwrap();

        let overlay = AuthgateConfig::from_toml(
            r#"
[server]
port = 3000
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.server().port, 3000);
        assert_eq!(base.paths().login, "/base-login");
    }

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let config = AuthgateConfig::from_toml(
            r#"
[server]
port = 9001

[[local_users]]
username = "a"
password = "b"
"#,
        )
        .unwrap();
        let reparsed = AuthgateConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_target_url_scheme_default() {
        let upstream = UpstreamConfig {
            target: Some("localhost:3000".to_string()),
            ..Default::default()
        };
        assert_eq!(upstream.target_url().unwrap().as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_target_url_rejects_bad_values() {
        let missing = UpstreamConfig::default();
        assert!(matches!(
            missing.target_url(),
            Err(crate::ConfigError::MissingField { .. })
        ));

        let ftp = UpstreamConfig {
            target: Some("ftp://files.example".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ftp.target_url(),
            Err(crate::ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthgateConfig::from_toml(
            r#"
[upstream]
token = "tok-secret"

[cookie]
seed = "seed-secret"
key = "key-secret"

[provider]
client_secret = "client-secret"

[[local_users]]
username = "admin"
password = "pw-secret"
"#,
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("tok-secret"));
        assert!(!debug.contains("seed-secret"));
        assert!(!debug.contains("key-secret"));
        assert!(!debug.contains("client-secret"));
        assert!(!debug.contains("pw-secret"));
        assert!(debug.contains("admin"));
    }
}
