//! Secret resolution and environment overrides.
//!
//! Secrets resolve in order:
//! 1. Environment variable
//! 2. Config file (with warning)
//!
//! Non-secret settings honour the same environment variables the proxy has
//! always been deployed with (`TARGET`, `PORT`, ...). Everything here runs
//! once at startup; nothing reads the environment at request time.

use crate::AuthgateConfig;

pub const TARGET_ENV: &str = "TARGET";
pub const TOKEN_ENV: &str = "TOKEN";
pub const COOKIE_SEED_ENV: &str = "COOKIE_SEED";
pub const COOKIE_KEY_ENV: &str = "COOKIE_KEY";
pub const CLIENT_ID_ENV: &str = "GOOGLE_OAUTH_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_OAUTH_CLIENT_SECRET";
pub const CALLBACK_URL_ENV: &str = "GOOGLE_OAUTH_CALLBACK_URL";
pub const PORT_ENV: &str = "PORT";
pub const HOMEPAGE_URL_ENV: &str = "HOMEPAGE_URL";
pub const CONTACT_EMAIL_ENV: &str = "CONTACT_EMAIL";
pub const TEMPLATE_DIR_ENV: &str = "TEMPLATE_DIR";
pub const STATIC_DIR_ENV: &str = "STATIC_DIR";

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve a secret from `env_var`, falling back to `config_value`.
pub fn resolve_secret(env_var: &str, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_secret_with(env_var, config_value, |k| std::env::var(k).ok())
}

/// [`resolve_secret`] against an arbitrary variable lookup.
pub fn resolve_secret_with(
    env_var: &str,
    config_value: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedSecret> {
    if let Some(value) = lookup(env_var).filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// Apply environment overrides from the process environment.
///
/// Returns warnings for secrets that were only found in the config file.
pub fn apply_env_overrides(config: &mut AuthgateConfig) -> Vec<String> {
    apply_env_overrides_with(config, |k| std::env::var(k).ok())
}

/// [`apply_env_overrides`] against an arbitrary variable lookup.
pub fn apply_env_overrides_with(
    config: &mut AuthgateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // Plain settings
    if let Some(target) = get(TARGET_ENV) {
        config.upstream.get_or_insert_with(Default::default).target = Some(target);
    }
    if let Some(port) = get(PORT_ENV) {
        match port.parse() {
            Ok(port) => config.server.get_or_insert_with(Default::default).port = port,
            Err(_) => warnings.push(format!("Ignoring {}={}: not a valid port", PORT_ENV, port)),
        }
    }
    if let Some(id) = get(CLIENT_ID_ENV) {
        config.provider.get_or_insert_with(Default::default).client_id = Some(id);
    }
    if let Some(url) = get(CALLBACK_URL_ENV) {
        config.provider.get_or_insert_with(Default::default).callback_url = Some(url);
    }
    if let Some(url) = get(HOMEPAGE_URL_ENV) {
        config.pages.get_or_insert_with(Default::default).homepage_url = Some(url);
    }
    if let Some(email) = get(CONTACT_EMAIL_ENV) {
        config.pages.get_or_insert_with(Default::default).contact_email = Some(email);
    }
    if let Some(dir) = get(TEMPLATE_DIR_ENV) {
        config.pages.get_or_insert_with(Default::default).template_dir = Some(dir.into());
    }
    if let Some(dir) = get(STATIC_DIR_ENV) {
        config.pages.get_or_insert_with(Default::default).static_dir = Some(dir.into());
    }

    // Secrets
    let cookie = config.cookie.get_or_insert_with(Default::default);
    cookie.seed = resolve_into(
        "cookie.seed",
        COOKIE_SEED_ENV,
        cookie.seed.take(),
        &lookup,
        &mut warnings,
    );
    cookie.key = resolve_into(
        "cookie.key",
        COOKIE_KEY_ENV,
        cookie.key.take(),
        &lookup,
        &mut warnings,
    );

    let upstream = config.upstream.get_or_insert_with(Default::default);
    upstream.token = resolve_into(
        "upstream.token",
        TOKEN_ENV,
        upstream.token.take(),
        &lookup,
        &mut warnings,
    );

    let provider = config.provider.get_or_insert_with(Default::default);
    provider.client_secret = resolve_into(
        "provider.client_secret",
        CLIENT_SECRET_ENV,
        provider.client_secret.take(),
        &lookup,
        &mut warnings,
    );

    warnings
}

fn resolve_into(
    field: &str,
    env_var: &str,
    config_value: Option<String>,
    lookup: &impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let resolved = resolve_secret_with(env_var, config_value.as_deref(), lookup)?;
    if resolved.source == SecretSource::ConfigFile {
        warnings.push(format!(
            "{} is stored in plaintext in the config file. \
             Consider setting {} instead.",
            field, env_var
        ));
    }
    Some(resolved.value)
}
