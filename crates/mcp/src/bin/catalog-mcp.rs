// Standalone MCP server binary (stdio transport)

use anyhow::{Context, Result};
use catalog_core::config::CatalogConfig;
use catalog_core::llm::AzureChatModel;
use catalog_core::query::{ChatQueryTranslator, QueryTranslator};
use catalog_core::storage::open_store;
use catalog_mcp::server::McpServer;
use catalog_mcp::tools::{register_product_tools, ToolRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Catalog MCP server starting...");

    let config = CatalogConfig::from_env().context("Failed to load configuration")?;
    let store = open_store(&config.store).context("Failed to connect to product store")?;

    let translator: Option<Arc<dyn QueryTranslator>> = match &config.llm {
        Some(llm) => {
            let model = AzureChatModel::new(llm).context("Failed to configure chat model")?;
            tracing::info!(
                deployment = model.deployment(),
                "Search queries will be translated by the chat model"
            );
            Some(Arc::new(ChatQueryTranslator::new(
                Arc::new(model),
                store.partition_key(),
            )))
        }
        None => {
            tracing::info!("No chat model configured, search uses substring matching");
            None
        }
    };

    let mut registry = ToolRegistry::new();
    register_product_tools(&mut registry, store, translator)?;
    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(registry);
    server.serve_stdio().await?;

    Ok(())
}
