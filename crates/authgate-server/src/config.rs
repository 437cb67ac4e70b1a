//! Server configuration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use authgate_config::{AuthgateConfig, PathsConfig};
use url::Url;

use crate::error::{Result, ServerError};

/// Default overall timeout for one inbound request (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time in-flight requests get to finish after a shutdown signal.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Default upstream connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Overall timeout for one inbound request.
    pub request_timeout: Duration,

    /// Enable request logging.
    pub request_logging: bool,

    /// Drain period after a shutdown signal.
    pub shutdown_grace: Duration,

    /// Control endpoint paths.
    pub paths: PathsConfig,

    // ─────────────────────────────────────────────────────────────────────────
    // Upstream
    // ─────────────────────────────────────────────────────────────────────────
    /// Where gated traffic is forwarded.
    pub target: Url,

    /// Bearer token added to authenticated upstream requests.
    pub upstream_token: Option<String>,

    /// Headers added to every upstream request.
    pub headers: BTreeMap<String, String>,

    /// Headers added only to authenticated or whitelisted upstream requests.
    pub authenticated_headers: BTreeMap<String, String>,

    pub connect_timeout: Duration,

    /// Overall upstream timeout. `None` leaves it to `request_timeout`.
    pub upstream_timeout: Option<Duration>,

    // ─────────────────────────────────────────────────────────────────────────
    // Gate bypass
    // ─────────────────────────────────────────────────────────────────────────
    /// Regexes matched against the request path.
    pub whitelist_paths: Vec<String>,

    /// Regexes matched against the request host (port stripped).
    pub whitelist_domains: Vec<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Pages
    // ─────────────────────────────────────────────────────────────────────────
    pub template_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub homepage_url: Option<String>,
    pub contact_email: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("request_timeout", &self.request_timeout)
            .field("request_logging", &self.request_logging)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("paths", &self.paths)
            .field("target", &self.target.as_str())
            .field(
                "upstream_token",
                &self.upstream_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field(
                "authenticated_headers",
                &self.authenticated_headers.keys().collect::<Vec<_>>(),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("whitelist_paths", &self.whitelist_paths)
            .field("whitelist_domains", &self.whitelist_domains)
            .field("template_dir", &self.template_dir)
            .field("static_dir", &self.static_dir)
            .field("homepage_url", &self.homepage_url)
            .field("contact_email", &self.contact_email)
            .finish()
    }
}

impl ServerConfig {
    /// Create a config forwarding to `target` with every other setting at
    /// its default.
    pub fn new(target: Url) -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_logging: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            paths: PathsConfig::default(),
            target,
            upstream_token: None,
            headers: BTreeMap::new(),
            authenticated_headers: BTreeMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            upstream_timeout: None,
            whitelist_paths: Vec::new(),
            whitelist_domains: Vec::new(),
            template_dir: None,
            static_dir: None,
            homepage_url: None,
            contact_email: None,
        }
    }

    /// Build from a loaded (and validated) configuration file.
    pub fn from_config(config: &AuthgateConfig) -> Result<Self> {
        let server = config.server();
        let upstream = config.upstream();
        let whitelist = config.whitelist();
        let pages = config.pages();

        let bind_address: SocketAddr = format!("{}:{}", server.bind, server.port)
            .parse()
            .map_err(|e| {
                ServerError::Config(format!(
                    "invalid bind address '{}:{}': {}",
                    server.bind, server.port, e
                ))
            })?;

        Ok(Self {
            bind_address,
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            request_logging: server.request_logging,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            paths: config.paths(),
            target: upstream.target_url()?,
            upstream_token: upstream.token.clone(),
            headers: upstream.headers.clone(),
            authenticated_headers: upstream.authenticated_headers.clone(),
            connect_timeout: Duration::from_secs(upstream.connect_timeout_secs),
            upstream_timeout: upstream.timeout_secs.map(Duration::from_secs),
            whitelist_paths: whitelist.paths,
            whitelist_domains: whitelist.domains,
            template_dir: pages.template_dir,
            static_dir: pages.static_dir,
            homepage_url: pages.homepage_url,
            contact_email: pages.contact_email,
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the inbound request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the shutdown drain period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Replace the control endpoint paths.
    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    /// Send `Authorization: Bearer <token>` on authenticated requests.
    pub fn with_upstream_token(mut self, token: impl Into<String>) -> Self {
        self.upstream_token = Some(token.into());
        self
    }

    /// Add a header to every upstream request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a header to authenticated upstream requests only.
    pub fn with_authenticated_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.authenticated_headers.insert(name.into(), value.into());
        self
    }

    /// Set the whitelisted path patterns.
    pub fn with_whitelist_paths(mut self, patterns: Vec<String>) -> Self {
        self.whitelist_paths = patterns;
        self
    }

    /// Set the whitelisted domain patterns.
    pub fn with_whitelist_domains(mut self, patterns: Vec<String>) -> Self {
        self.whitelist_domains = patterns;
        self
    }

    /// Serve static assets from `dir`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Load page template overrides from `dir`.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Set the home page link and contact address shown on pages.
    pub fn with_contact(
        mut self,
        homepage_url: Option<String>,
        contact_email: Option<String>,
    ) -> Self {
        self.homepage_url = homepage_url;
        self.contact_email = contact_email;
        self
    }
}
