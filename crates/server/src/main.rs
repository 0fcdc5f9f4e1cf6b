use anyhow::{Context, Result};
use catalog_core::config::CatalogConfig;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;

use config::{AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "catalog-server")]
#[command(about = "Product catalog MCP tool server over HTTP", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CATALOG_SERVER_CONFIG", default_value = "catalog.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "CATALOG_SERVER_PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "CATALOG_SERVER_HOST", default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Starting catalog server");

    let config = ServerConfig::load(&args.config)?;
    let catalog = CatalogConfig::from_env().context("Failed to load configuration")?;
    let state = AppState::new(&config, &catalog)?;

    let addr = format!("{}:{}", args.host, args.port);
    api::serve(&addr, state, &config.http.mcp_path).await?;

    Ok(())
}
