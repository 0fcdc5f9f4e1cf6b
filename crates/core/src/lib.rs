// Core types and functionality for the product catalog tool server

pub mod config;
pub mod error;
pub mod llm;
pub mod query;
pub mod storage;
pub mod types;

pub use config::{CatalogConfig, LlmConfig, StoreConfig, StoreCredential};
pub use error::{CatalogError, ErrorKind, StartupError};
pub use storage::{open_store, ProductStore, QuerySpec, StoreInfo};
pub use types::*;
