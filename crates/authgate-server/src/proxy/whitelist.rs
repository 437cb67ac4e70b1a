//! Requests that bypass the session check.

use axum::http::Method;
use regex::Regex;

use crate::error::{Result, ServerError};

/// Compiled path and domain patterns.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    paths: Vec<Regex>,
    domains: Vec<Regex>,
}

impl Whitelist {
    /// Compile the given patterns. Any invalid pattern is a config error.
    pub fn new(paths: &[String], domains: &[String]) -> Result<Self> {
        Ok(Self {
            paths: compile("whitelist.paths", paths)?,
            domains: compile("whitelist.domains", domains)?,
        })
    }

    /// `OPTIONS` requests always pass; otherwise any path or host match does.
    pub fn is_whitelisted(&self, method: &Method, path: &str, host: &str) -> bool {
        method == Method::OPTIONS || self.is_whitelisted_path(path) || self.is_whitelisted_domain(host)
    }

    pub fn is_whitelisted_path(&self, path: &str) -> bool {
        self.paths.iter().any(|re| re.is_match(path))
    }

    pub fn is_whitelisted_domain(&self, host: &str) -> bool {
        !host.is_empty() && self.domains.iter().any(|re| re.is_match(host))
    }
}

fn compile(field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ServerError::Config(format!("{}: {}", field, e)))
        })
        .collect()
}
