//! # Rater - Quizrank difficulty engine
//!
//! Serves the difficulty rating service over a small JSON API.
//!
//! ## Architecture
//! ```text
//! Quiz pages → Rater → PostgREST (question_difficulty)
//!                ↓
//!          Snapshot cache
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rater::config::{AppConfig, ConfigOverrides};
use rater::routes;
use rater::state::AppState;

/// Quizrank Rater - adaptive question difficulty service
#[derive(Parser, Debug)]
#[command(name = "rater")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/rater.toml")]
    config: String,

    /// Record store base URL (overrides config)
    #[arg(long, env = "STORE_URL")]
    store_url: Option<String>,

    /// Record store service key (overrides config)
    #[arg(long, env = "STORE_API_KEY", hide_env_values = true)]
    store_api_key: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Serve from an in-process store instead of PostgREST
    #[arg(long)]
    in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up .env before clap reads env fallbacks
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Quizrank Rater v{}", env!("CARGO_PKG_VERSION"));

    let overrides = ConfigOverrides {
        store_url: args.store_url.clone(),
        api_key: args.store_api_key.clone(),
        listen_addr: args.listen.clone(),
    };
    let config = AppConfig::load(&args.config, &overrides)?;
    info!("Configuration loaded from {}", args.config);

    let state = if args.in_memory {
        info!("Using in-memory record store");
        AppState::in_memory(config.clone())
    } else {
        let state = AppState::new(config.clone())?;
        info!(store_url = %config.store.url, table = %config.store.table, "Record store configured");
        state
    };

    if let Err(e) = state.service.ping().await {
        tracing::warn!(kind = e.kind(), error = %e, "Record store not reachable yet");
    }

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Rater listening on {}", config.listen_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Rater shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
