//! Request classification.
//!
//! Every request outside `/healthz` is classified exactly once, by an ordered
//! list of predicates where the first match wins.

use authgate_config::PathsConfig;
use axum::http::Method;

use super::whitelist::Whitelist;

/// What the proxy does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ErrorPage,
    ResetPage,
    SignupPage,
    LoginPage,
    /// Local credentials submitted to the login path.
    LoginSubmit,
    Static,
    ProviderLogin,
    Logout,
    /// Forwarded without a session check.
    Whitelisted,
    ProviderCallback,
    /// Session required, then forwarded.
    Gated,
}

impl Route {
    /// Stable label for logs.
    pub fn label(self) -> &'static str {
        match self {
            Route::ErrorPage => "error_page",
            Route::ResetPage => "reset_page",
            Route::SignupPage => "signup_page",
            Route::LoginPage => "login_page",
            Route::LoginSubmit => "login_submit",
            Route::Static => "static",
            Route::ProviderLogin => "provider_login",
            Route::Logout => "logout",
            Route::Whitelisted => "whitelisted",
            Route::ProviderCallback => "provider_callback",
            Route::Gated => "gated",
        }
    }
}

/// The paths and patterns requests are classified against.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub paths: PathsConfig,
    pub provider_login: String,
    pub provider_callback: String,
    pub whitelist: Whitelist,
}

impl RouteTable {
    pub fn classify(&self, method: &Method, path: &str, host: &str) -> Route {
        let clean = normalize(path);
        let get = method == Method::GET;
        let paths = &self.paths;

        if get && clean == paths.error {
            Route::ErrorPage
        } else if get && clean == paths.reset {
            Route::ResetPage
        } else if get && clean == paths.signup {
            Route::SignupPage
        } else if get && clean == paths.login {
            Route::LoginPage
        } else if method == Method::POST && clean == paths.login {
            Route::LoginSubmit
        } else if get && clean.starts_with(paths.static_prefix.as_str()) {
            Route::Static
        } else if clean == self.provider_login {
            Route::ProviderLogin
        } else if clean == paths.logout {
            Route::Logout
        } else if self.whitelist.is_whitelisted(method, path, host) {
            Route::Whitelisted
        } else if clean == self.provider_callback {
            Route::ProviderCallback
        } else {
            Route::Gated
        }
    }
}

/// Strip a single trailing slash.
pub fn normalize(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// The request host without any port, for domain matching.
pub fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal: keep the brackets, drop anything after them.
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}
