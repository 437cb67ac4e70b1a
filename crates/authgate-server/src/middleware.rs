//! Request logging and panic reporting.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic;
use std::sync::Once;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{Request, StatusCode, header::CONTENT_LENGTH},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::proxy::Route;
use crate::state::AppState;

/// Log one structured line per request.
///
/// The route label comes from the [`Route`] extension the dispatcher puts on
/// the response; fixed routes such as `/healthz` log their path instead.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_bytes = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();
    let route = response
        .extensions()
        .get::<Route>()
        .map_or(path.as_str(), |r| r.label());
    // Streamed bodies have no exact size up front.
    let response_bytes = response.body().size_hint().exact();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            route,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            request_bytes,
            response_bytes,
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            route,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            request_bytes,
            response_bytes,
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            route,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            request_bytes,
            response_bytes,
            "Request completed"
        );
    }

    response
}

/// Turn a handler panic into a plain 500.
///
/// The stack trace is logged by the hook from [`install_panic_hook`], which
/// runs on the panicking thread before the payload reaches this handler.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(&*payload), "Handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Install a panic hook that logs the panic site and a captured backtrace.
///
/// The previous hook still runs afterwards. Installing twice is a no-op.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".to_string());
            tracing::error!(
                panic = %panic_message(info.payload()),
                location = %location,
                backtrace = %Backtrace::force_capture(),
                "Panic"
            );
            original_hook(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u32), "unknown panic payload");
    }

    #[test]
    fn test_panic_hook_logs_location_and_backtrace() {
        install_panic_hook();
        install_panic_hook();

        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            panic::catch_unwind(|| panic!("boom in handler"))
        });
        assert!(result.is_err());

        let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("boom in handler"));
        assert!(logged.contains("middleware.rs"));
        assert!(logged.contains("backtrace="));
    }

    #[test]
    fn test_handle_panic_returns_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
