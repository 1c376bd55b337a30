// # gyndnsd - GynDNS Daemon
//
// Thin integration layer over gyndns-core. The daemon is responsible for:
// 1. Reading the JSON configuration file
// 2. Initializing logging and the runtime
// 3. Building the listeners and the supervisor
// 4. Translating OS signals into a graceful shutdown
//
// ## Configuration
//
// The configuration file path is the first command-line argument, or
// `GYNDNS_CONFIG` when no argument is given.
//
// - `GYNDNS_CONFIG`: Path to the configuration file
// - `GYNDNS_LOG_LEVEL`: Overrides `log_level` from the file
//
// ## Example
//
// ```bash
// cat > /etc/gyndns.json <<'JSON'
// {
//   "http": { "address": "0.0.0.0", "port": 8000 },
//   "dns": { "address": "0.0.0.0", "port": 53 },
//   "store": { "type": "file", "path": "/var/lib/gyndns/records.json" },
//   "users": [ { "username": "alice", "password": "s3cret",
//                "names": ["home.example.com"] } ]
// }
// JSON
//
// gyndnsd /etc/gyndns.json
// ```

use anyhow::{Context, Result};
use gyndns_core::{ServiceConfig, Supervisor};
use std::env;
use std::future::Future;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "GYNDNS_CONFIG";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: A listener failed while serving
#[derive(Debug, Clone, Copy)]
enum GynExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (fatal listener error)
    RuntimeError = 2,
}

impl From<GynExitCode> for ExitCode {
    fn from(code: GynExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GynExitCode::ConfigError.into();
        }
    };

    let log_level = match config.tracing_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return GynExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GynExitCode::ConfigError.into();
    }

    info!("Starting gyndnsd daemon");
    info!("Configuration loaded: {} user(s)", config.users.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GynExitCode::ConfigError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Read the configuration named on the command line or in the environment
fn load_config() -> Result<ServiceConfig> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .with_context(|| {
            format!(
                "no configuration file given. Usage: gyndnsd <config.json> (or set {})",
                CONFIG_ENV
            )
        })?;

    ServiceConfig::load(&path).with_context(|| format!("loading {}", path))
}

/// Run the service until a signal or a fatal listener error
async fn run_daemon(config: ServiceConfig) -> GynExitCode {
    let supervisor = match Supervisor::from_config(&config).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!("Startup failed: {}", e);
            return GynExitCode::ConfigError;
        }
    };

    let shutdown = match shutdown_signal() {
        Ok(signal) => signal,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return GynExitCode::ConfigError;
        }
    };

    match supervisor.run(shutdown).await {
        Ok(()) => {
            info!("gyndnsd stopped");
            GynExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            GynExitCode::RuntimeError
        }
    }
}

/// Future resolving on the first SIGTERM or SIGINT
///
/// Handlers are installed before the future is returned so that a signal
/// arriving during startup is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal: Ctrl-C");
    })
}
