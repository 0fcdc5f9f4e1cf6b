// Environment-sourced configuration for the store and the hosted model

use crate::error::StartupError;
use crate::types::{PartitionKey, DEFAULT_PARTITION_FIELD};
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "CATALOG_ENDPOINT";
pub const ENV_KEY: &str = "CATALOG_KEY";
pub const ENV_CLIENT_ID: &str = "CATALOG_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CATALOG_CLIENT_SECRET";
pub const ENV_TENANT_ID: &str = "CATALOG_TENANT_ID";
pub const ENV_DATABASE: &str = "CATALOG_DATABASE";
pub const ENV_CONTAINER: &str = "CATALOG_CONTAINER";
pub const ENV_PARTITION_KEY: &str = "CATALOG_PARTITION_KEY";

pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

pub const DEFAULT_DATABASE: &str = "products-db";
pub const DEFAULT_CONTAINER: &str = "products";
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Full process configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub store: StoreConfig,
    /// Present only when the hosted model is configured
    pub llm: Option<LlmConfig>,
}

impl CatalogConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            store: StoreConfig::from_lookup(&get)?,
            llm: LlmConfig::from_lookup(&get),
        })
    }
}

/// How the store client authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum StoreCredential {
    Key(String),
    ClientSecret {
        client_id: String,
        client_secret: String,
        tenant_id: String,
    },
    /// Whatever identity the environment provides
    Ambient,
}

impl StoreCredential {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::ClientSecret { .. } => "client_secret",
            Self::Ambient => "ambient",
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(_) => f.write_str("Key(<redacted>)"),
            Self::ClientSecret {
                client_id,
                tenant_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("tenant_id", tenant_id)
                .finish_non_exhaustive(),
            Self::Ambient => f.write_str("Ambient"),
        }
    }
}

/// Document store connection settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint: String,
    pub credential: StoreCredential,
    pub database: String,
    pub container: String,
    pub partition_key: PartitionKey,
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential: StoreCredential::Ambient,
            database: DEFAULT_DATABASE.to_string(),
            container: DEFAULT_CONTAINER.to_string(),
            partition_key: PartitionKey::default(),
        }
    }

    fn from_lookup<F>(get: &F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = get(ENV_ENDPOINT).ok_or(StartupError::MissingConfig(ENV_ENDPOINT))?;

        let credential = if let Some(key) = get(ENV_KEY) {
            StoreCredential::Key(key)
        } else {
            match (get(ENV_CLIENT_ID), get(ENV_CLIENT_SECRET), get(ENV_TENANT_ID)) {
                (Some(client_id), Some(client_secret), Some(tenant_id)) => {
                    StoreCredential::ClientSecret {
                        client_id,
                        client_secret,
                        tenant_id,
                    }
                }
                (None, None, None) => StoreCredential::Ambient,
                _ => {
                    tracing::warn!(
                        "Incomplete service principal settings ({}, {}, {}); using ambient credentials",
                        ENV_CLIENT_ID,
                        ENV_CLIENT_SECRET,
                        ENV_TENANT_ID
                    );
                    StoreCredential::Ambient
                }
            }
        };

        let partition_field = get(ENV_PARTITION_KEY)
            .map(|field| field.trim().trim_start_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_PARTITION_FIELD.to_string());
        if partition_field.is_empty() || partition_field.contains('/') {
            return Err(StartupError::InvalidConfig {
                key: ENV_PARTITION_KEY,
                message: format!("'{}' is not a top-level field name", partition_field),
            });
        }

        Ok(Self {
            endpoint,
            credential,
            database: get(ENV_DATABASE).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            container: get(ENV_CONTAINER).unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            partition_key: PartitionKey::new(partition_field),
        })
    }
}

/// Hosted chat-completion model settings
#[derive(Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(endpoint: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read model settings from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    fn from_lookup<F>(get: &F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = get(ENV_OPENAI_ENDPOINT)?;
        let deployment = get(ENV_OPENAI_DEPLOYMENT)?;
        let mut config = Self::new(endpoint, deployment);
        config.api_key = get(ENV_OPENAI_API_KEY);
        if let Some(version) = get(ENV_OPENAI_API_VERSION) {
            config.api_version = version;
        }
        Some(config)
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}
