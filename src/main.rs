use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vanpi_app_api::app::{router, AppState};
use vanpi_app_api::config::AppConfig;
use vanpi_app_api::database::{DatabaseManager, PgSwitchRegistry};
use vanpi_app_api::services::{build_http_client, HttpControlService};

#[derive(Parser)]
#[command(name = "vanpi-app-api", version, about = "VanPi control panel gateway")]
struct Args {
    /// Address to bind
    #[arg(long, env = "VANPI_APP_API_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on (overrides VANPI_APP_API_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and the API roots
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting VanPi App API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let client = build_http_client(&config.downstream).context("failed to build http client")?;

    let registry = Arc::new(PgSwitchRegistry::new(pool));
    let control = Arc::new(HttpControlService::new(client.clone(), &config.downstream));

    let addr = SocketAddr::new(args.bind, args.port.unwrap_or(config.api.port));
    let app = router(AppState::new(config, registry, control, client));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("VanPi App API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}
