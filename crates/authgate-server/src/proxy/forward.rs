//! Streaming forwarder to the upstream service.

use std::net::IpAddr;

use axum::{
    body::{Body, HttpBody},
    http::{
        HeaderMap, HeaderName, HeaderValue, Request, Response, Uri,
        header::{AUTHORIZATION, CONNECTION, HOST},
    },
};
use futures::TryStreamExt;
use url::Url;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Sends requests to the upstream and streams the answers back.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    target: Url,
    headers: HeaderMap,
    authenticated_headers: HeaderMap,
}

impl Forwarder {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServerError::Config(format!("failed to build HTTP client: {}", e)))?;

        let headers = header_map(&config.headers)?;
        let mut authenticated_headers = header_map(&config.authenticated_headers)?;
        if let Some(token) = &config.upstream_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ServerError::Config("upstream token is not a valid header value".into()))?;
            authenticated_headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            client,
            target: config.target.clone(),
            headers,
            authenticated_headers,
        })
    }

    /// The upstream URL for an inbound request URI.
    ///
    /// The target's own path is prefixed to the request path.
    pub fn upstream_url(&self, uri: &Uri) -> Url {
        let mut url = self.target.clone();
        let path = format!("{}{}", self.target.path().trim_end_matches('/'), uri.path());
        url.set_path(&path);
        url.set_query(uri.query());
        url
    }

    /// Headers sent upstream for an inbound request.
    pub fn upstream_headers(
        &self,
        inbound: &HeaderMap,
        client_ip: Option<IpAddr>,
        authenticated: bool,
    ) -> HeaderMap {
        let mut headers = strip_hop_by_hop(inbound);
        headers.remove(HOST);

        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        if authenticated {
            for (name, value) in &self.authenticated_headers {
                headers.insert(name.clone(), value.clone());
            }
        }

        if let Some(ip) = client_ip {
            let mut chain: Vec<String> = headers
                .get_all(X_FORWARDED_FOR)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect();
            chain.push(ip.to_string());
            if let Ok(value) = HeaderValue::from_str(&chain.join(", ")) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        headers
    }

    /// Forward `request` and stream the upstream response back.
    ///
    /// Dropping the returned future aborts the upstream call.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
        authenticated: bool,
    ) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();
        let url = self.upstream_url(&parts.uri);
        let headers = self.upstream_headers(&parts.headers, client_ip, authenticated);

        tracing::debug!(method = %parts.method, url = %url, "Forwarding request upstream");

        let mut upstream = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(headers);
        if body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let response = upstream.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Upstream request failed");
            ServerError::Upstream(format!("failed to reach upstream: {}", e))
        })?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers());
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        let mut out = Response::new(Body::from_stream(stream));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

fn header_map(pairs: &std::collections::BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ServerError::Config(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ServerError::Config(format!("invalid value for header '{}'", name)))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Copy `headers` minus hop-by-hop ones, including any the `Connection`
/// header names.
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let named: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower) || named.iter().any(|n| n == lower) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(target: &str) -> Forwarder {
        let config = ServerConfig::new(Url::parse(target).unwrap())
            .with_header("X-Static", "yes")
            .with_authenticated_header("X-User-Scope", "internal")
            .with_upstream_token("tok");
        Forwarder::new(&config).unwrap()
    }

    #[test]
    fn test_upstream_url_joins_paths() {
        let f = forwarder("http://upstream:3000");
        let url = f.upstream_url(&"/protected?a=1&b=2".parse().unwrap());
        assert_eq!(url.as_str(), "http://upstream:3000/protected?a=1&b=2");

        let f = forwarder("http://upstream:3000/app/");
        let url = f.upstream_url(&"/protected".parse().unwrap());
        assert_eq!(url.as_str(), "http://upstream:3000/app/protected");
    }

    #[test]
    fn test_authenticated_headers_only_when_authenticated() {
        let f = forwarder("http://upstream");
        let inbound = HeaderMap::new();

        let anon = f.upstream_headers(&inbound, None, false);
        assert_eq!(anon["x-static"], "yes");
        assert!(anon.get(AUTHORIZATION).is_none());
        assert!(anon.get("x-user-scope").is_none());

        let authed = f.upstream_headers(&inbound, None, true);
        assert_eq!(authed[AUTHORIZATION], "Bearer tok");
        assert_eq!(authed["x-user-scope"], "internal");
    }

    #[test]
    fn test_client_authorization_is_replaced() {
        let f = forwarder("http://upstream");
        let mut inbound = HeaderMap::new();
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer forged"));

        let headers = f.upstream_headers(&inbound, None, true);
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_x_forwarded_for_appended() {
        let f = forwarder("http://upstream");
        let mut inbound = HeaderMap::new();
        inbound.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        inbound.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.2"));

        let headers = f.upstream_headers(&inbound, Some("192.168.1.5".parse().unwrap()), false);
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2, 192.168.1.5");
    }

    #[test]
    fn test_hop_by_hop_and_host_dropped() {
        let f = forwarder("http://upstream");
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("proxy.example.com"));
        inbound.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        inbound.insert("x-private", HeaderValue::from_static("1"));
        inbound.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        inbound.insert("accept", HeaderValue::from_static("text/html"));

        let headers = f.upstream_headers(&inbound, None, false);
        assert!(headers.get(HOST).is_none());
        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get("x-private").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert_eq!(headers["accept"], "text/html");
    }

    #[test]
    fn test_invalid_static_header() {
        let config = ServerConfig::new(Url::parse("http://upstream").unwrap())
            .with_header("bad header", "x");
        assert!(matches!(Forwarder::new(&config), Err(ServerError::Config(_))));
    }
}
