//! clipforge-server – entry point.
//!
//! Startup order for `serve`:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Create the output and temp directories; make sure ffmpeg is usable.
//! 4. Start the render worker pool and the periodic retention sweep.
//! 5. Build the Axum router and serve with graceful shutdown.

mod cli;
mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clipforge_core::render::encode::ensure_ffmpeg;
use clipforge_core::{OutputFormat, PatternRenderer, Scheduler, SchedulerConfig, SystemClock};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "clipforge-server", version, about = "Asynchronous short-clip generation service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Render one clip in the foreground and print its path.
    Render(cli::RenderArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Render(args) => cli::render(args, &cfg).await.map(|_| ()),
    }
}

fn init_tracing(cfg: &Config) {
    // Warn loudly if the configured value is not a valid filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CLIPFORGE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "clipforge-server starting");

    // ── 3. Filesystem & encoder ────────────────────────────────────────────────
    for dir in [&cfg.output_dir, &cfg.temp_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    if cfg.output_format == OutputFormat::Mp4 {
        let auto_download = cfg.ffmpeg_auto_download;
        match tokio::task::spawn_blocking(move || ensure_ffmpeg(auto_download)).await? {
            Ok(()) => info!("ffmpeg ready"),
            Err(e) => warn!(error = %e, "ffmpeg unavailable; mp4 renders will fail until it is installed"),
        }
    }
    if cfg.enable_auth && cfg.api_key.is_none() {
        warn!("CLIPFORGE_ENABLE_AUTH is set without CLIPFORGE_API_KEY; generation requests will be rejected");
    }

    // ── 4. Task runtime ────────────────────────────────────────────────────────
    let renderer = PatternRenderer::new(cfg.output_dir.clone(), cfg.output_format);
    let scheduler = Scheduler::start(
        SchedulerConfig {
            workers: cfg.workers,
            profiles: cfg.profiles.clone(),
        },
        Arc::new(renderer),
        Arc::new(SystemClock),
    );
    let sweeper = scheduler.sweeper().spawn(
        Duration::from_secs(cfg.sweep_interval_secs),
        cfg.retention_hours,
    );

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        scheduler,
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, output_dir = %cfg.output_dir.display(), format = %cfg.output_format, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("clipforge-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["clipforge-server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn render_arguments_parse() {
        let cli = Cli::try_parse_from([
            "clipforge-server",
            "render",
            "--prompt",
            "blue ocean",
            "--platform",
            "youtube_shorts",
            "--duration",
            "120",
            "--format",
            "gif",
        ])
        .unwrap();
        let Some(Command::Render(args)) = cli.command else {
            panic!("expected render subcommand");
        };
        assert_eq!(args.prompt, "blue ocean");
        assert_eq!(args.duration, Some(120));
        assert_eq!(args.format, Some(OutputFormat::Gif));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["clipforge-server", "render", "--prompt", "x", "--format", "avi"]).is_err());
    }
}
