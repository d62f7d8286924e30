#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;
mod jobs;
mod logging;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tenancy_db::{MemoryStore, TenantIsolation};
use tenant_gateway::{TenantResolver, with_tenancy};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, LogFormat};

/// Multi-tenant back-office API with row-level tenant isolation.
#[derive(Parser, Debug)]
#[command(name = "tenancy-server", version, about, long_about = None)]
struct Cli {
    /// YAML config file with `server` and `tenancy` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_addr`
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override `server.log_format`
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        cfg.server.bind_addr = bind;
    }
    if let Some(format) = cli.log_format {
        cfg.server.log_format = format;
    }
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    logging::init(cfg.server.log_format)?;
    tracing::info!(
        isolation = cfg.tenancy.enabled,
        header = %cfg.tenancy.header_name,
        query = %cfg.tenancy.query_param,
        "starting tenancy-server"
    );

    let mem = MemoryStore::new();
    if cfg.server.seed_demo {
        routes::seed_demo(&mem);
    }
    let store: routes::Store = Arc::new(TenantIsolation::new(mem).with_enabled(cfg.tenancy.enabled));

    if cfg.server.stats_interval_secs > 0 {
        jobs::spawn_user_stats(
            Arc::clone(&store),
            Duration::from_secs(cfg.server.stats_interval_secs),
        );
    }

    let resolver = TenantResolver::from_config(&cfg.tenancy)?;
    let policy = routes::isolation_policy()?;
    let app = with_tenancy(routes::router(store), resolver, policy).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cfg.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind_addr))?;
    tracing::info!(addr = %cfg.server.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
