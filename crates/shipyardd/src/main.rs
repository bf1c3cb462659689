//! shipyardd: the Shipyard daemon.
//!
//! Assembles the release pipeline and serves it over HTTP:
//! - App registry (in memory) with per-app logs
//! - Scheduler backend (docker, kubernetes or mock)
//! - Publisher + release service
//! - REST API
//!
//! # Usage
//!
//! ```text
//! shipyardd serve --addr tcp://0.0.0.0:8080 --scheduler docker --config shipyard.toml
//! shipyardd --log-format json serve --addr unix:///run/shipyard.sock
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use shipyard_api::build_router;
use shipyard_release::{Publisher, ReleaseService, SchedulerSource};
use shipyard_scheduler::new_scheduler;
use shipyard_state::{AppRegistry, FileLogSink, LogSink, MemoryAppStore, TracingLogSink};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{DaemonConfig, ListenAddr, DEFAULT_ADDR};

#[derive(Parser)]
#[command(name = "shipyardd", about = "Shipyard daemon")]
struct Cli {
    /// Default log filter; RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the release API.
    Serve {
        /// Listen address, tcp://host:port or unix:///path.
        #[arg(long)]
        addr: Option<String>,

        /// Scheduler backend: docker, kubernetes or mock.
        #[arg(long)]
        scheduler: Option<String>,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for per-app log files.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Serve {
            addr,
            scheduler,
            config,
            log_dir,
        } => {
            let mut settings = match config {
                Some(path) => DaemonConfig::from_file(&path)?,
                None => DaemonConfig::default(),
            };
            if let Some(addr) = addr {
                settings.addr = Some(addr);
            }
            if let Some(kind) = scheduler {
                settings.scheduler.kind = kind.parse()?;
            }
            if let Some(dir) = log_dir {
                settings.log_dir = Some(dir);
            }
            run_serve(settings).await
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level}"))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run_serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("Shipyard daemon starting");

    let addr: ListenAddr = config.addr.as_deref().unwrap_or(DEFAULT_ADDR).parse()?;

    // ── Initialize subsystems ──────────────────────────────────

    // Scheduler. Built once up front so bad settings fail at startup.
    let scheduler = new_scheduler(&config.scheduler).context("invalid scheduler settings")?;
    info!(kind = %config.scheduler.kind, "scheduler initialized");

    let source = if config.publish.scheduler_per_publish {
        SchedulerSource::Settings(config.scheduler.clone())
    } else {
        SchedulerSource::Shared(scheduler)
    };
    let options = config.publish.options();
    info!(
        teardown_on_failure = options.teardown_on_failure,
        poll_attempts = options.poll.attempts,
        "publisher initialized"
    );
    let publisher = Arc::new(Publisher::new(source, options));

    // App registry.
    let log: Arc<dyn LogSink> = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log dir {}", dir.display()))?;
            info!(path = ?dir, "app logs written to files");
            Arc::new(FileLogSink::new(dir))
        }
        None => Arc::new(TracingLogSink),
    };
    let registry = AppRegistry::new(Arc::new(MemoryAppStore::new()), log)
        .with_empty_releases(config.seed_empty_release);

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ReleaseService::new(registry, publisher));
    info!(%addr, "API server starting");

    match addr {
        ListenAddr::Tcp(addr) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        ListenAddr::Unix(path) => serve_unix(&path, router).await?,
    }

    info!("Shipyard daemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn serve_unix(path: &Path, router: axum::Router) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing stale socket {}", path.display())),
    }
    let listener = tokio::net::UnixListener::bind(path)
        .with_context(|| format!("binding {}", path.display()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o660))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    let _ = std::fs::remove_file(path);
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix(path: &Path, _router: axum::Router) -> anyhow::Result<()> {
    anyhow::bail!("unix sockets are not supported on this platform: {}", path.display())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    }
}
