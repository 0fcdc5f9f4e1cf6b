// Error taxonomy shared by the store, the query layer and the tool handlers

use serde::{Deserialize, Serialize};

/// Errors surfaced by catalog operations.
///
/// Every variant maps onto exactly one [`ErrorKind`], which is what callers of
/// the tool surface get to see.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Product with ID '{id}' not found in partition '{partition}'")]
    NotFound { id: String, partition: String },

    #[error("Product with ID '{id}' already exists in partition '{partition}'")]
    Conflict { id: String, partition: String },

    /// The concurrency token presented on replace no longer matches the stored record.
    #[error("Product with ID '{id}' in partition '{partition}' was modified concurrently; re-read it and retry the update")]
    PreconditionFailed { id: String, partition: String },

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Query translation failed: {0}")]
    Translation(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl CatalogError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Caller-visible classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } | Self::PreconditionFailed { .. } => ErrorKind::Conflict,
            Self::MissingFields(_) | Self::Validation { .. } | Self::Query(_) => {
                ErrorKind::ValidationError
            }
            Self::Translation(_) | Self::Store(_) => ErrorKind::StoreError,
        }
    }

    /// Whether repeating the operation after re-reading state can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

/// Error classification reported alongside failed tool results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationError,
    StoreError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ValidationError => "validation_error",
            Self::StoreError => "store_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that prevent the process from serving at all.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{0} environment variable must be set")]
    MissingConfig(&'static str),

    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: &'static str, message: String },

    #[error("Failed to connect to product store: {0}")]
    Connection(String),
}
