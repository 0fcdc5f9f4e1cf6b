use anyhow::{bail, Context, Result};
use catalog_core::config::CatalogConfig;
use catalog_core::llm::AzureChatModel;
use catalog_core::query::{ChatQueryTranslator, QueryTranslator};
use catalog_core::storage::{open_store, ProductStore};
use catalog_mcp::tools::{register_product_tools, ToolRegistry};
use catalog_mcp::McpServer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Route accepting JSON-RPC POSTs
    #[serde(default = "default_mcp_path")]
    pub mcp_path: String,
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            mcp_path: default_mcp_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Translate search requests with the chat model when one is configured
    #[serde(default = "default_use_translator")]
    pub use_translator: bool,
}

fn default_use_translator() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            use_translator: default_use_translator(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        let config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let path = &self.http.mcp_path;
        if !path.starts_with('/') || path.len() < 2 {
            bail!("http.mcp_path must be an absolute route such as '/mcp', got '{}'", path);
        }
        if path == "/health" {
            bail!("http.mcp_path cannot be '/health'");
        }
        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mcp: McpServer,
    pub store: Arc<dyn ProductStore>,
}

impl AppState {
    /// Connect to the store and register the product tools.
    pub fn new(config: &ServerConfig, catalog: &CatalogConfig) -> Result<Self> {
        let store = open_store(&catalog.store).context("Failed to connect to product store")?;

        let translator: Option<Arc<dyn QueryTranslator>> = match &catalog.llm {
            Some(llm) if config.search.use_translator => {
                let model = AzureChatModel::new(llm).context("Failed to configure chat model")?;
                tracing::info!(deployment = model.deployment(), "Search translation enabled");
                Some(Arc::new(ChatQueryTranslator::new(
                    Arc::new(model),
                    store.partition_key(),
                )))
            }
            _ => {
                tracing::info!("Search translation disabled, using substring matching");
                None
            }
        };

        Self::with_store(store, translator)
    }

    pub fn with_store(
        store: Arc<dyn ProductStore>,
        translator: Option<Arc<dyn QueryTranslator>>,
    ) -> Result<Self> {
        let mut registry = ToolRegistry::new();
        register_product_tools(&mut registry, store.clone(), translator)?;
        tracing::info!("Registered {} tools", registry.len());

        Ok(Self {
            mcp: McpServer::new(registry),
            store,
        })
    }
}
