//! HTTP server for authgate.
//!
//! An authenticating reverse proxy: every request outside the fixed routes
//! is classified, and either answered by the proxy itself (login, error and
//! static pages, the OAuth2 flow) or forwarded upstream once the session
//! cookie checks out.
//!
//! # Example
//!
//! ```ignore
//! use authgate_server::{AppState, Server};
//!
//! let state = AppState::from_config(&config)?;
//! Server::from_state(state).run(shutdown_signal()).await?;
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod proxy;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use middleware::{install_panic_hook, request_logging_middleware};
pub use pages::{HandlebarsRenderer, Page, PageRenderer};
pub use proxy::{Route, RouteTable};
pub use state::AppState;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// The authgate proxy server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::health_routes())
            .fallback(proxy::dispatch)
            // Request logging (inner layer, sees the route label)
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                middleware::request_logging_middleware,
            ))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.state.config.request_timeout,
            ))
            .layer(CatchPanicLayer::custom(middleware::handle_panic))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_address();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener (useful for testing).
    ///
    /// After `shutdown` resolves, in-flight requests get the configured grace
    /// period to finish; connections still open after that are dropped.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let grace = self.state.config.shutdown_grace;
        let router = self.router();

        if let Ok(addr) = listener.local_addr() {
            info!("Starting server on {}", addr);
        }

        let signalled = Arc::new(Notify::new());
        let notify = signalled.clone();
        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received, draining connections");
            notify.notify_one();
        })
        .into_future();

        tokio::select! {
            result = serve => {
                result.map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;
            }
            _ = async {
                signalled.notified().await;
                tokio::time::sleep(grace).await;
            } => {
                warn!(grace_ms = %grace.as_millis(), "Drain period elapsed, dropping open connections");
            }
        }

        info!("Server stopped");
        Ok(())
    }
}
