//! Redirect responses and the values they carry.

use axum::{
    http::{HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Duration;
use url::form_urlencoded;

/// Signed cookie holding where to send the user after a provider login.
pub const REDIRECT_COOKIE_NAME: &str = "auth_redirect";

/// How long a stored post-login target stays valid.
pub const REDIRECT_TARGET_MAX_AGE: Duration = Duration::hours(1);

/// Shown when the error page is opened without a readable message.
pub const DEFAULT_ERROR_MESSAGE: &str = "No error message found";

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    redirect(StatusCode::FOUND, location)
}

/// `307` to the error page with `message` carried base64 encoded.
pub fn to_error_page(error_path: &str, message: &str) -> Response {
    let encoded: String = form_urlencoded::byte_serialize(STANDARD.encode(message).as_bytes()).collect();
    redirect(
        StatusCode::TEMPORARY_REDIRECT,
        &format!("{}?error={}", error_path, encoded),
    )
}

/// Decode the error page's `error` parameter.
///
/// Form decoding turns an unescaped `+` into a space; those are restored
/// before base64 decoding.
pub fn decode_error(param: Option<&str>) -> String {
    param
        .and_then(|raw| STANDARD.decode(raw.replace(' ', "+")).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| {
            if param.is_some() {
                tracing::debug!("Failed to decode error message");
            }
            DEFAULT_ERROR_MESSAGE.to_string()
        })
}

/// Accept only same-origin absolute paths as a post-login target.
pub fn sanitize_target(target: &str) -> Option<&str> {
    let local = target.starts_with('/') && !target.starts_with("//") && !target.contains('\\');
    local.then_some(target)
}

/// Percent-encode a query parameter value.
pub fn encode_param(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn redirect(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(location, "Redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found() {
        let res = found("/auth/login?p=/protected");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[LOCATION], "/auth/login?p=/protected");
    }

    #[test]
    fn test_error_page_redirect_survives_plus() {
        // "??>" encodes to "Pz8+" in standard base64.
        let res = to_error_page("/auth/error", "??>");
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = res.headers()[LOCATION].to_str().unwrap().to_string();
        assert_eq!(location, "/auth/error?error=Pz8%2B");

        let query = location.split_once('?').unwrap().1;
        let param = form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "error")
            .map(|(_, v)| v.into_owned());
        assert_eq!(decode_error(param.as_deref()), "??>");
    }

    #[test]
    fn test_decode_error_fallbacks() {
        assert_eq!(decode_error(None), DEFAULT_ERROR_MESSAGE);
        assert_eq!(decode_error(Some("%%%not base64")), DEFAULT_ERROR_MESSAGE);
        assert_eq!(decode_error(Some("Pz8 ")), "??>");
    }

    #[test]
    fn test_sanitize_target() {
        assert_eq!(sanitize_target("/docs?page=2"), Some("/docs?page=2"));
        assert_eq!(sanitize_target("//evil.example"), None);
        assert_eq!(sanitize_target("https://evil.example"), None);
        assert_eq!(sanitize_target("/\\evil.example"), None);
        assert_eq!(sanitize_target(""), None);
    }
}
