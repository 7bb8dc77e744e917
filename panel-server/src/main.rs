//! mtpanel binary entry point.
//!
//! Usage:
//! ```bash
//! mtpanel --config panel.toml
//! mtpanel --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use mtpanel_server::cleanup::spawn_cleanup_task;
use mtpanel_server::config::Config;
use mtpanel_server::http::{build_router, health};
use mtpanel_server::public_ip::spawn_public_ip_task;
use mtpanel_server::server::ProxyPanel;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments for the panel.
#[derive(Parser, Debug)]
#[command(name = "mtpanel")]
#[command(about = "MTProto relay credential panel")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "panel.toml", env = "MTPANEL_CONFIG")]
    config: PathBuf,
    /// Bearer token for the admin API, overrides `server.admin_token`.
    #[arg(long, env = "MTPANEL_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    let admin_token = args
        .admin_token
        .or_else(|| config.server.admin_token.clone())
        .filter(|t| !t.trim().is_empty())
        .context("an admin token is required (server.admin_token or MTPANEL_ADMIN_TOKEN)")?;

    health::init_start_time();

    let panel = Arc::new(
        ProxyPanel::open(config.clone())
            .await
            .context("failed to open panel state")?,
    );
    panel.startup().await;

    let cleanup = spawn_cleanup_task(panel.clone(), config.cleanup.clone());
    let ip_refresh = spawn_public_ip_task(panel.public_ip_arc(), config.public_ip.clone());

    let listener = TcpListener::bind(config.server.bind_address.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!("mtpanel v{} listening on {}", env!("CARGO_PKG_VERSION"), config.server.bind_address);

    axum::serve(listener, build_router(panel, admin_token))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
        })
        .await
        .context("http server error")?;

    cleanup.abort();
    ip_refresh.abort();
    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    if !path.exists() {
        info!("config file {} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    let config = Config::from_file(path)?;
    info!("loaded config from {}", path.display());
    Ok(config)
}
