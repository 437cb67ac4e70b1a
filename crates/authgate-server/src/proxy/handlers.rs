//! Per-route request handling.

use std::collections::HashMap;
use std::net::SocketAddr;

use authgate_cookie::{CSRF_COOKIE_NAME, make_cookie, make_invalidation_cookie, signer};
use authgate_oauth::{User, check_csrf_state};
use authgate_session::SessionRecord;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{
        Method, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, HOST, PRAGMA},
    },
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Serialize;
use tower::ServiceExt;
use url::form_urlencoded;

use super::redirect::{
    REDIRECT_COOKIE_NAME, REDIRECT_TARGET_MAX_AGE, decode_error, encode_param, found,
    sanitize_target, to_error_page,
};
use super::route::{Route, host_without_port};
use crate::error::ServerError;
use crate::pages::{ErrorPageData, InfoPageData, LoginPageData, Page};
use crate::state::AppState;

/// Largest form body read for a login or a form-post callback.
const MAX_FORM_BYTES: usize = 16 * 1024;

/// Entry point for every request outside the fixed routes.
///
/// The chosen [`Route`] is attached to the response as an extension.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .map(host_without_port)
        .unwrap_or_default()
        .to_string();

    let route = state
        .routes
        .classify(request.method(), request.uri().path(), &host);
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        route = route.label(),
        "Classified request"
    );

    let jar = CookieJar::from_headers(request.headers());
    let mut response = match route {
        Route::ErrorPage => error_page(&state, request.uri()),
        Route::ResetPage => info_page(&state, jar, Page::Reset),
        Route::SignupPage => info_page(&state, jar, Page::Signup),
        Route::LoginPage => login_page(&state, jar, request.uri()),
        Route::LoginSubmit | Route::ProviderLogin => login(&state, jar, request).await,
        Route::Static => static_file(&state, request).await,
        Route::Logout => logout(&state, jar),
        Route::Whitelisted => forward(&state, request, true).await,
        Route::ProviderCallback => callback(&state, jar, request).await,
        Route::Gated => gated(&state, jar, request).await,
    };

    response.extensions_mut().insert(route);
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Pages
// ─────────────────────────────────────────────────────────────────────────────

const NO_CACHE: [(axum::http::HeaderName, &str); 3] = [
    (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (PRAGMA, "no-cache"),
    (EXPIRES, "0"),
];

fn render(state: &AppState, page: Page, data: impl Serialize) -> Response {
    let html = serde_json::to_value(data)
        .map_err(|e| ServerError::Render(e.to_string()))
        .and_then(|value| state.pages.render(page, &value));

    match html {
        Ok(html) => (NO_CACHE, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn error_page(state: &AppState, uri: &Uri) -> Response {
    let params = query_params(uri);
    render(
        state,
        Page::Error,
        ErrorPageData {
            static_path: state.config.paths.static_prefix.clone(),
            error_message: decode_error(params.get("error").map(String::as_str)),
            homepage_url: state.config.homepage_url.clone(),
            contact_email: state.config.contact_email.clone(),
        },
    )
}

fn info_page(state: &AppState, jar: CookieJar, page: Page) -> Response {
    let jar = state.sessions.remove_session(jar);
    let data = InfoPageData {
        static_path: state.config.paths.static_prefix.clone(),
        login_path: state.config.paths.login.clone(),
        homepage_url: state.config.homepage_url.clone(),
    };
    (jar, render(state, page, data)).into_response()
}

fn login_page(state: &AppState, jar: CookieJar, uri: &Uri) -> Response {
    let jar = state.sessions.remove_session(jar);

    let params = query_params(uri);
    let provider_login_href = match params.get("p").and_then(|p| sanitize_target(p)) {
        Some(target) => format!("{}?p={}", state.routes.provider_login, encode_param(target)),
        None => state.routes.provider_login.clone(),
    };

    let data = LoginPageData {
        static_path: state.config.paths.static_prefix.clone(),
        provider_name: state.provider.data().name.clone(),
        provider_login_href,
        login_action: state.config.paths.login.clone(),
        local_auth: !state.local_auth.is_empty(),
    };
    (jar, render(state, Page::Login, data)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Login / logout
// ─────────────────────────────────────────────────────────────────────────────

/// Local credentials first (POST only), then the provider flow.
async fn login(state: &AppState, jar: CookieJar, request: Request) -> Response {
    let uri = request.uri().clone();

    if request.method() == Method::POST && !state.local_auth.is_empty() {
        let form = read_form(request).await;
        let username = form.get("username").map(String::as_str).unwrap_or_default();
        let password = form.get("password").map(String::as_str).unwrap_or_default();

        if let Some(user) = state.local_auth.authenticate(username, password) {
            let record = SessionRecord::unauthorized(user.id(), user.name(), user.email());
            return match state.sessions.attach_session(jar, &record) {
                Ok(jar) => {
                    tracing::info!(user = user.username(), "Local user logged in");
                    (jar, found("/")).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to attach session");
                    to_error_page(&state.config.paths.error, "failed to create session")
                }
            };
        }
        tracing::debug!("Local credentials rejected, falling back to provider login");
    }

    start_provider_login(state, jar, &uri)
}

fn start_provider_login(state: &AppState, jar: CookieJar, uri: &Uri) -> Response {
    let (jar, url) = match state.provider.provider_login_url(jar) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build provider login URL");
            return to_error_page(
                &state.config.paths.error,
                "failed to generate Oauth2 authentication link",
            );
        }
    };

    let params = query_params(uri);
    let jar = match params.get("p").and_then(|p| sanitize_target(p)) {
        Some(target) => {
            let value = signer::sign(state.sessions.seed(), REDIRECT_COOKIE_NAME, target, Utc::now());
            jar.add(make_cookie(REDIRECT_COOKIE_NAME, value))
        }
        None if jar.get(REDIRECT_COOKIE_NAME).is_some() => {
            jar.add(make_invalidation_cookie(REDIRECT_COOKIE_NAME))
        }
        None => jar,
    };

    (jar, found(url.as_str())).into_response()
}

fn logout(state: &AppState, jar: CookieJar) -> Response {
    (state.sessions.remove_session(jar), found("/")).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider callback
// ─────────────────────────────────────────────────────────────────────────────

async fn callback(state: &AppState, jar: CookieJar, request: Request) -> Response {
    let error_path = &state.config.paths.error;
    let params = callback_params(request).await;

    if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
        tracing::info!(error = %error, "Provider denied the login");
        return to_error_page(error_path, &format!("Permission denied: {}", error));
    }

    let csrf_state = params.get("state").map(String::as_str).unwrap_or_default();
    if let Err(e) = check_csrf_state(&jar, csrf_state) {
        tracing::warn!(error = %e, "Rejected provider callback");
        return to_error_page(error_path, "invalid csrf state");
    }

    let provider = &state.provider;
    let code = params.get("code").map(String::as_str).unwrap_or_default();
    let token = match provider.exchange(code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(provider = %provider.data().name, error = %e, "Code exchange failed");
            return to_error_page(
                error_path,
                &format!(
                    "failed to exchange authorization code with {}",
                    provider.data().name
                ),
            );
        }
    };

    let user = match provider.get_user(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(provider = %provider.data().name, error = %e, "Userinfo request failed");
            return to_error_page(error_path, "failed to get userdata from Oauth provider");
        }
    };
    drop(token);

    tracing::info!(id = user.id(), user = user.username(), "User logged in");

    let target = redirect_target(state, &jar);
    let record = SessionRecord::unauthorized(user.id(), user.name(), user.email());
    let jar = match state.sessions.attach_session(jar, &record) {
        Ok(jar) => jar,
        Err(e) => {
            tracing::error!(error = %e, "Failed to attach session");
            return to_error_page(error_path, "failed to create session");
        }
    };
    let jar = jar
        .add(make_invalidation_cookie(CSRF_COOKIE_NAME))
        .add(make_invalidation_cookie(REDIRECT_COOKIE_NAME));

    (jar, found(&target)).into_response()
}

/// Query parameters, overridden by a form-encoded POST body
/// (`response_mode=form_post`).
async fn callback_params(request: Request) -> HashMap<String, String> {
    let mut params = query_params(request.uri());
    let is_form = request.method() == Method::POST
        && request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        params.extend(read_form(request).await);
    }
    params
}

/// The verified post-login target, or `/`.
fn redirect_target(state: &AppState, jar: &CookieJar) -> String {
    jar.get(REDIRECT_COOKIE_NAME)
        .and_then(|cookie| {
            signer::verify(
                REDIRECT_COOKIE_NAME,
                cookie.value(),
                state.sessions.seed(),
                REDIRECT_TARGET_MAX_AGE,
                Utc::now(),
            )
        })
        .and_then(|verified| sanitize_target(&verified.value).map(str::to_string))
        .unwrap_or_else(|| "/".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate and forwarding
// ─────────────────────────────────────────────────────────────────────────────

async fn gated(state: &AppState, jar: CookieJar, request: Request) -> Response {
    match state.sessions.read_session(&jar) {
        Ok(record) if state.provider.authenticate_session(&record) => {
            forward(state, request, true).await
        }
        Ok(record) => {
            tracing::debug!(session_id = %record.id, "Session rejected by provider");
            to_login(state, jar, request.uri())
        }
        Err(e) => {
            tracing::debug!(error = %e, "No valid session");
            to_login(state, jar, request.uri())
        }
    }
}

fn to_login(state: &AppState, jar: CookieJar, uri: &Uri) -> Response {
    let location = format!("{}?p={}", state.config.paths.login, uri.path());
    (state.sessions.remove_session(jar), found(&location)).into_response()
}

async fn forward(state: &AppState, request: Request, authenticated: bool) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match state.forwarder.forward(request, client_ip, authenticated).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Forwarding failed");
            to_error_page(
                &state.config.paths.error,
                "failed to reach the upstream service",
            )
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Static assets
// ─────────────────────────────────────────────────────────────────────────────

async fn static_file(state: &AppState, request: Request) -> Response {
    let Some(files) = state.static_files.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (mut parts, body) = request.into_parts();
    let prefix = state.config.paths.static_prefix.as_str();
    let rest = parts.uri.path().strip_prefix(prefix).unwrap_or_default();
    let stripped = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };
    parts.uri = match stripped.parse() {
        Ok(uri) => uri,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    match files.oneshot(Request::from_parts(parts, body)).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn query_params(uri: &Uri) -> HashMap<String, String> {
    form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}

async fn read_form(request: Request) -> HashMap<String, String> {
    match axum::body::to_bytes(request.into_body(), MAX_FORM_BYTES).await {
        Ok(bytes) => form_urlencoded::parse(&bytes).into_owned().collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read form body");
            HashMap::new()
        }
    }
}
