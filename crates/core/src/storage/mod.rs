pub mod redb_store;
pub mod seed;

pub use redb_store::RedbProductStore;
pub use seed::{container_stats, seed_documents, seed_products, ContainerStats, SeedReport};

use crate::config::StoreConfig;
use crate::error::{CatalogError, StartupError};
use crate::query::Filter;
use crate::types::{ETag, PartitionKey, Product, ProductKey};
use serde::Serialize;
use std::sync::Arc;

/// Scan parameters for [`ProductStore::query_items`]
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Restrict the scan to one partition
    pub partition: Option<String>,
    pub filter: Option<Filter>,
    pub max_item_count: usize,
}

impl QuerySpec {
    pub fn new(max_item_count: usize) -> Self {
        Self {
            partition: None,
            filter: None,
            max_item_count,
        }
    }

    pub fn in_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// What a store is connected to, for logs and health reports
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub backend: &'static str,
    pub database: String,
    pub container: String,
    pub partition_key: String,
}

/// Document store holding the product container.
///
/// Point operations address a record by id plus partition-key value. The store
/// owns the reserved `_rid`/`_self`/`_etag`/`_ts`/`_attachments` fields.
pub trait ProductStore: Send + Sync {
    /// Point read
    fn read_item(&self, key: &ProductKey) -> Result<Product, CatalogError>;

    /// Insert a new record; fails with `Conflict` when the id exists in the partition
    fn create_item(&self, product: Product) -> Result<Product, CatalogError>;

    /// Replace an existing record, optionally only if its concurrency token still matches
    fn replace_item(
        &self,
        key: &ProductKey,
        product: Product,
        if_match: Option<&ETag>,
    ) -> Result<Product, CatalogError>;

    /// Point delete
    fn delete_item(&self, key: &ProductKey) -> Result<(), CatalogError>;

    /// Filtered scan ordered by id, bounded by `max_item_count`
    fn query_items(&self, spec: &QuerySpec) -> Result<Vec<Product>, CatalogError>;

    /// Lightweight read used by health checks
    fn ping(&self) -> Result<(), CatalogError>;

    fn partition_key(&self) -> &PartitionKey;

    fn describe(&self) -> StoreInfo;
}

/// Connect to the store described by `config`. Called once at startup.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ProductStore>, StartupError> {
    let store = RedbProductStore::open(config)?;
    Ok(Arc::new(store))
}
