//! HTML pages served by the proxy itself.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Result, ServerError};

/// The pages the proxy renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Error,
    Reset,
    Signup,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Login, Page::Error, Page::Reset, Page::Signup];

    /// Template name; overrides are looked up as `<name>.hbs`.
    pub fn name(self) -> &'static str {
        match self {
            Page::Login => "login",
            Page::Error => "error",
            Page::Reset => "reset",
            Page::Signup => "signup",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Page::Login => include_str!("../templates/login.hbs"),
            Page::Error => include_str!("../templates/error.hbs"),
            Page::Reset => include_str!("../templates/reset.hbs"),
            Page::Signup => include_str!("../templates/signup.hbs"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginPageData {
    pub static_path: String,
    pub provider_name: String,
    /// Provider login link, carrying the post-login target when there is one.
    pub provider_login_href: String,
    /// Form action for local credentials.
    pub login_action: String,
    pub local_auth: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorPageData {
    pub static_path: String,
    pub error_message: String,
    pub homepage_url: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InfoPageData {
    pub static_path: String,
    pub login_path: String,
    pub homepage_url: Option<String>,
}

/// Renders pages to HTML.
pub trait PageRenderer: Send + Sync {
    fn render(&self, page: Page, data: &serde_json::Value) -> Result<String>;
}

/// Handlebars templates: the built-in set, each optionally replaced by a
/// `<name>.hbs` file from a template directory.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsRenderer").finish_non_exhaustive()
    }
}

impl HandlebarsRenderer {
    pub fn new(template_dir: Option<&Path>) -> Result<Self> {
        let mut registry = Handlebars::new();

        for page in Page::ALL {
            let override_path = template_dir.map(|dir| dir.join(format!("{}.hbs", page.name())));
            match override_path {
                Some(path) if path.is_file() => {
                    tracing::info!(page = page.name(), path = %path.display(), "Using template override");
                    registry
                        .register_template_file(page.name(), &path)
                        .map_err(|e| {
                            ServerError::Config(format!(
                                "failed to parse template {}: {}",
                                path.display(),
                                e
                            ))
                        })?;
                }
                _ => {
                    registry
                        .register_template_string(page.name(), page.builtin())
                        .map_err(|e| ServerError::Render(e.to_string()))?;
                }
            }
        }

        Ok(Self { registry })
    }
}

impl PageRenderer for HandlebarsRenderer {
    fn render(&self, page: Page, data: &serde_json::Value) -> Result<String> {
        self.registry
            .render(page.name(), data)
            .map_err(|e| ServerError::Render(format!("{}: {}", page.name(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_login_page() {
        let renderer = HandlebarsRenderer::new(None).unwrap();
        let data = serde_json::to_value(LoginPageData {
            static_path: "/static".to_string(),
            provider_name: "Google".to_string(),
            provider_login_href: "/auth/google/login?p=%2Fdocs".to_string(),
            login_action: "/auth/login".to_string(),
            local_auth: false,
        })
        .unwrap();

        let html = renderer.render(Page::Login, &data).unwrap();
        assert!(html.contains("<title>Login</title>"));
        assert!(html.contains("Sign in with Google"));
        assert!(!html.contains("<form"));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let renderer = HandlebarsRenderer::new(None).unwrap();
        let data = serde_json::to_value(ErrorPageData {
            static_path: "/static".to_string(),
            error_message: "<script>alert(1)</script>".to_string(),
            homepage_url: None,
            contact_email: Some("ops@example.com".to_string()),
        })
        .unwrap();

        let html = renderer.render(Page::Error, &data).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("ops@example.com"));
    }

    #[test]
    fn test_template_override() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("error.hbs"), "custom: {{error_message}}").unwrap();

        let renderer = HandlebarsRenderer::new(Some(dir.path())).unwrap();
        let html = renderer
            .render(Page::Error, &serde_json::json!({"error_message": "boom"}))
            .unwrap();
        assert_eq!(html, "custom: boom");

        // Pages without an override keep the built-in template.
        let html = renderer
            .render(Page::Reset, &serde_json::json!({"login_path": "/auth/login"}))
            .unwrap();
        assert!(html.contains("Reset password"));
    }

    #[test]
    fn test_broken_override_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("login.hbs"), "{{#if broken}}").unwrap();
        assert!(matches!(
            HandlebarsRenderer::new(Some(dir.path())),
            Err(ServerError::Config(_))
        ));
    }
}
