//! Common test utilities for integration tests.
//!
//! Spawns a mock upstream and a mock identity provider on ephemeral ports and
//! an authgate server in front of the upstream.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use axum::{
    Form, Json, Router,
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use reqwest::{Client, header::SET_COOKIE};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use authgate_oauth::{OAuthClientConfig, providers};
use authgate_server::{AppState, Server, ServerConfig};
use authgate_session::{SessionManager, SessionRecord};

pub const SEED: &str = "0123456789abcdefghijklmnopqrstuv";
pub const KEY: &str = "0123456789abcdef";
pub const UPSTREAM_TOKEN: &str = "upstream-token";

// ─────────────────────────────────────────────────────────────────────────────
// Mock upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Echo what arrived, one `key=value` per line.
async fn echo(request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    if parts.uri.path().starts_with("/teapot") {
        return (StatusCode::IM_A_TEAPOT, [("x-upstream", "yes")], "short and stout").into_response();
    }

    if parts.uri.path().starts_with("/slow") {
        tokio::time::sleep(Duration::from_secs(2)).await;
        return "finally".into_response();
    }

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();

    format!(
        "hostname=upstream\nmethod={}\npath={}\nquery={}\nauthorization={}\nx-forwarded-for={}\nx-static={}\nbody={}\n",
        parts.method,
        parts.uri.path(),
        parts.uri.query().unwrap_or_default(),
        header("authorization"),
        header("x-forwarded-for"),
        header("x-static"),
        body,
    )
    .into_response()
}

/// Spawn the echo upstream and return its base URL.
pub async fn spawn_upstream() -> Result<String> {
    let app = Router::new().fallback(echo);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock identity provider
// ─────────────────────────────────────────────────────────────────────────────

/// A mock OAuth 2.0 provider counting the calls it receives.
#[derive(Clone)]
pub struct MockIdp {
    pub base_url: String,
    pub token_calls: Arc<AtomicUsize>,
    pub userinfo_calls: Arc<AtomicUsize>,
}

impl MockIdp {
    pub async fn spawn() -> Result<Self> {
        let token_calls = Arc::new(AtomicUsize::new(0));
        let userinfo_calls = Arc::new(AtomicUsize::new(0));

        let tc = token_calls.clone();
        let uc = userinfo_calls.clone();
        let app = Router::new()
            .route(
                "/token",
                post(move |Form(form): Form<std::collections::HashMap<String, String>>| {
                    let tc = tc.clone();
                    async move {
                        tc.fetch_add(1, Ordering::SeqCst);
                        match form.get("code").map(String::as_str) {
                            Some("good") => (
                                StatusCode::OK,
                                Json(serde_json::json!({
                                    "access_token": "at-1",
                                    "token_type": "Bearer",
                                    "expires_in": 3600
                                })),
                            ),
                            _ => (
                                StatusCode::BAD_REQUEST,
                                Json(serde_json::json!({"error": "invalid_grant"})),
                            ),
                        }
                    }
                }),
            )
            .route(
                "/userinfo",
                get(move |headers: HeaderMap| {
                    let uc = uc.clone();
                    async move {
                        uc.fetch_add(1, Ordering::SeqCst);
                        let authorized = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            == Some("Bearer at-1");
                        if authorized {
                            (
                                StatusCode::OK,
                                Json(serde_json::json!({
                                    "id": "42",
                                    "email": "user@example.com",
                                    "verified_email": true,
                                    "name": "Test User"
                                })),
                            )
                        } else {
                            (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})))
                        }
                    }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            token_calls,
            userinfo_calls,
        })
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn userinfo_calls(&self) -> usize {
        self.userinfo_calls.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test server
// ─────────────────────────────────────────────────────────────────────────────

/// An authgate server running in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client that does not follow redirects.
    pub client: Client,
    /// Same secrets as the server, for minting session cookies.
    pub sessions: SessionManager,
    pub idp: MockIdp,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<authgate_server::Result<()>>,
}

impl TestServer {
    /// Start a server in front of a fresh echo upstream.
    pub async fn start() -> Result<Self> {
        let upstream = spawn_upstream().await?;
        Self::start_with(&upstream, |config| config).await
    }

    /// Start a server forwarding to `target`, adjusting the config first.
    pub async fn start_with(
        target: &str,
        configure: impl FnOnce(ServerConfig) -> ServerConfig,
    ) -> Result<Self> {
        let idp = MockIdp::spawn().await?;

        let config = configure(
            ServerConfig::new(Url::parse(target)?)
                .with_request_logging(false)
                .with_shutdown_grace(Duration::from_millis(500))
                .with_upstream_token(UPSTREAM_TOKEN)
                .with_header("X-Static", "always")
                .with_whitelist_paths(vec!["^/public/".to_string()]),
        );

        let mut oauth =
            OAuthClientConfig::google("client-id", "client-secret", "http://app/auth/google/callback");
        oauth.auth_url = format!("{}/authorize", idp.base_url);
        oauth.token_url = format!("{}/token", idp.base_url);
        oauth.userinfo_url = format!("{}/userinfo", idp.base_url);
        let provider = providers::new("google", oauth)?;

        let sessions = SessionManager::new(SEED, KEY)?;
        let state = AppState::new(config, sessions.clone(), provider)?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            addr,
            client,
            sessions,
            idp,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// A `Cookie` header value carrying a valid session for `record`.
    pub fn session_cookie(&self, record: &SessionRecord) -> Result<String> {
        let payload = serde_json::to_string(record)?;
        let cookie = self.sessions.make_session_cookie(&payload)?;
        Ok(format!("{}={}", cookie.name(), cookie.value()))
    }

    /// GET `path` with a valid session.
    pub async fn get_authenticated(&self, path: &str) -> Result<reqwest::Response> {
        let cookie = self.session_cookie(&SessionRecord::unauthorized("42", "Test User", "user@example.com"))?;
        Ok(self
            .client
            .get(self.url(path))
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await?)
    }

    /// Signal shutdown and wait for the server task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle).await???;
        Ok(())
    }
}

/// `name=value` of the `Set-Cookie` header for `name`, if any.
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

/// The `name=value` part of a `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

/// The `Location` header of a redirect.
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// An address nothing listens on.
pub async fn closed_port() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
