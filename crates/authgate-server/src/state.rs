//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use authgate_config::AuthgateConfig;
use authgate_oauth::{LocalAuth, LocalUser, OAuthClientConfig, Provider, providers};
use authgate_session::SessionManager;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::pages::{HandlebarsRenderer, PageRenderer};
use crate::proxy::{Forwarder, RouteTable, Whitelist};

/// Shared application state.
///
/// Everything is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Session cookie codec.
    pub sessions: Arc<SessionManager>,

    /// Identity provider.
    pub provider: Arc<dyn Provider>,

    /// In-memory credentials checked on login POST.
    pub local_auth: Arc<LocalAuth>,

    /// Request classification.
    pub routes: Arc<RouteTable>,

    /// Upstream forwarder.
    pub forwarder: Arc<Forwarder>,

    /// Page renderer.
    pub pages: Arc<dyn PageRenderer>,

    /// Static asset service, when a directory is configured.
    pub static_files: Option<ServeDir>,
}

impl AppState {
    /// Create state from its parts, with built-in pages and no local users.
    pub fn new(
        config: ServerConfig,
        sessions: SessionManager,
        provider: Arc<dyn Provider>,
    ) -> Result<Self> {
        let whitelist = Whitelist::new(&config.whitelist_paths, &config.whitelist_domains)?;
        let routes = RouteTable {
            paths: config.paths.clone(),
            provider_login: provider.login_path(),
            provider_callback: provider.callback_path(),
            whitelist,
        };
        let forwarder = Forwarder::new(&config)?;
        let pages = HandlebarsRenderer::new(config.template_dir.as_deref())?;
        let static_files = config.static_dir.as_ref().map(ServeDir::new);

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            provider,
            local_auth: Arc::new(LocalAuth::new()),
            routes: Arc::new(routes),
            forwarder: Arc::new(forwarder),
            pages: Arc::new(pages),
            static_files,
        })
    }

    /// Build everything from a validated configuration file.
    pub fn from_config(config: &AuthgateConfig) -> Result<Self> {
        let server = ServerConfig::from_config(config)?;

        let cookie = config.cookie();
        let sessions = SessionManager::new(
            cookie.seed.unwrap_or_default(),
            cookie.key.unwrap_or_default().into_bytes(),
        )?;

        let p = config.provider();
        let mut oauth = OAuthClientConfig::google(
            p.client_id.unwrap_or_default(),
            p.client_secret.unwrap_or_default(),
            p.callback_url.unwrap_or_default(),
        );
        if !p.scopes.is_empty() {
            oauth.scopes = p.scopes;
        }
        if let Some(url) = p.auth_url {
            oauth.auth_url = url;
        }
        if let Some(url) = p.token_url {
            oauth.token_url = url;
        }
        if let Some(url) = p.userinfo_url {
            oauth.userinfo_url = url;
        }
        oauth.timeout = Duration::from_secs(p.timeout_secs);
        let provider = providers::new(&p.name, oauth)?;

        let local_auth: LocalAuth = config
            .local_users
            .iter()
            .map(|u| LocalUser::new(&u.username, &u.password))
            .collect();

        Ok(Self::new(server, sessions, provider)?.with_local_auth(local_auth))
    }

    /// Replace the local credential store.
    pub fn with_local_auth(mut self, local_auth: LocalAuth) -> Self {
        self.local_auth = Arc::new(local_auth);
        self
    }

    /// Replace the page renderer.
    pub fn with_pages(mut self, pages: Arc<dyn PageRenderer>) -> Self {
        self.pages = pages;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("provider", &self.provider.data().name)
            .field("local_users", &!self.local_auth.is_empty())
            .field("static_files", &self.static_files.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;

    const CONFIG: &str = r#"
[upstream]
target = "http://localhost:3000"

[cookie]
seed = "0123456789abcdefghijklmnopqrstuv"
key = "0123456789abcdef"

[provider]
client_id = "id"
client_secret = "secret"
callback_url = "https://app/auth/google/callback"

[[local_users]]
username = "admin"
password = "hunter2"
"#;

    #[test]
    fn test_from_config() {
        let config = AuthgateConfig::from_toml(CONFIG).unwrap();
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.provider.data().name, "Google");
        assert_eq!(state.routes.provider_login, "/auth/google/login");
        assert!(state.local_auth.authenticate("admin", "hunter2").is_some());
        assert!(state.static_files.is_none());
    }

    #[test]
    fn test_from_config_bad_key() {
        let mut config = AuthgateConfig::from_toml(CONFIG).unwrap();
        config.cookie.as_mut().unwrap().key = Some("short".to_string());
        assert!(matches!(
            AppState::from_config(&config),
            Err(ServerError::Session(_))
        ));
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let mut config = AuthgateConfig::from_toml(CONFIG).unwrap();
        config.provider.as_mut().unwrap().name = "okta".to_string();
        assert!(matches!(
            AppState::from_config(&config),
            Err(ServerError::Provider(_))
        ));
    }
}
