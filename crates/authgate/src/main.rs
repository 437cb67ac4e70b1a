//! authgate - authenticating reverse proxy
//!
//! Main entry point: parse the command line, load configuration, set up
//! logging and serve until SIGINT/SIGTERM.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use authgate_config::{
    AuthgateConfig, LogFormat, LoggingConfig, apply_env_overrides, load_config_with_options,
};
use authgate_server::{AppState, Server, install_panic_hook};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// authgate - put an OAuth2 login in front of any HTTP service
#[derive(Parser)]
#[command(name = "authgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file, loaded on top of the discovered ones
    #[arg(short, long, env = "AUTHGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "AUTHGATE_BIND")]
    pub bind: Option<IpAddr>,

    /// Upstream to forward authenticated traffic to
    #[arg(long)]
    pub target: Option<String>,

    /// Console log format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Load and validate configuration, then exit
    #[arg(long)]
    pub check_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Command-line values win over files and environment.
    fn apply_overrides(&self, config: &mut AuthgateConfig) {
        if let Some(port) = self.port {
            config.server.get_or_insert_with(Default::default).port = port;
        }
        if let Some(bind) = self.bind {
            config.server.get_or_insert_with(Default::default).bind = bind.to_string();
        }
        if let Some(target) = &self.target {
            config.upstream.get_or_insert_with(Default::default).target = Some(target.clone());
        }
        if let Some(format) = self.log_format {
            config.logging.get_or_insert_with(Default::default).format = format.into();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config_with_options(None, None, cli.config.as_deref())
        .context("failed to load configuration")?;
    let sources: Vec<PathBuf> = loaded
        .loaded_from()
        .into_iter()
        .map(|p| p.to_path_buf())
        .collect();
    let mut config = loaded.config;
    let mut warnings = loaded.warnings;
    warnings.extend(apply_env_overrides(&mut config));
    cli.apply_overrides(&mut config);

    let _guard = init_logging(&config.logging(), cli.verbose)?;
    install_panic_hook();

    for path in &sources {
        info!(path = %path.display(), "Loaded config file");
    }
    for warning in &warnings {
        warn!("{}", warning);
    }

    config.validate().context("invalid configuration")?;

    if cli.check_config {
        println!("Configuration OK");
        for path in &sources {
            println!("  loaded {}", path.display());
        }
        return Ok(());
    }

    let state = AppState::from_config(&config).context("failed to initialise proxy")?;
    info!(
        target = %state.config.target,
        provider = %state.provider.data().name,
        "Starting authgate"
    );

    Server::from_state(state).run(shutdown_signal()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: &[&str] = &[
    "authgate",
    "authgate_server",
    "authgate_oauth",
    "authgate_session",
    "authgate_cookie",
    "authgate_config",
];

fn crate_filter(level: &str, rest: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    directives.push(rest.to_string());
    directives.join(",")
}

/// Console (pretty or JSON) plus an optional daily-rotated JSON file.
///
/// `RUST_LOG` overrides the console filter. The returned guard flushes the
/// file writer and must live until exit.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let console_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ if verbose => EnvFilter::try_new(crate_filter("debug", "info"))?,
        _ => EnvFilter::try_new(&logging.level)?,
    };

    let console: Box<dyn Layer<Registry> + Send + Sync> = match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let (file, guard) = match &logging.dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", logging.file_prefix));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::try_new(crate_filter("trace", "info"))?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file)
        .try_init()
        .context("failed to initialise logging")?;

    Ok(guard)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
