//! Bulk loading of product documents and container statistics.

use super::{ProductStore, QuerySpec};
use crate::error::CatalogError;
use crate::types::Product;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One document that could not be inserted.
#[derive(Debug)]
pub struct SeedFailure {
    /// Position in the input batch
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub error: CatalogError,
}

impl std::fmt::Display for SeedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to insert {} (ID: {}): {}",
            self.name.as_deref().unwrap_or("Unknown"),
            self.id.as_deref().unwrap_or("Unknown"),
            self.error
        )
    }
}

/// Outcome of a bulk insert.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub succeeded: usize,
    pub failures: Vec<SeedFailure>,
}

impl SeedReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed()
    }
}

/// Snapshot of the product container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerStats {
    pub backend: &'static str,
    pub database: String,
    pub container: String,
    /// Partition key as document paths, e.g. `["/category"]`
    pub partition_key: Vec<String>,
    pub item_count: usize,
}

/// Extract the documents of a seed file: a bare array or `{"products": [...]}`.
pub fn seed_documents(document: Value) -> Result<Vec<Value>, CatalogError> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("products") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(CatalogError::validation("products", "must be a JSON array")),
            None => Err(CatalogError::MissingFields(vec!["products".to_string()])),
        },
        _ => Err(CatalogError::validation(
            "seed file",
            "expected a JSON array of products",
        )),
    }
}

/// Insert every document in order.
///
/// Each document goes through the same checks as a create: required fields,
/// typed price and name, timestamps stamped when absent. A failing document is
/// recorded and the batch continues.
pub fn seed_products(
    store: &dyn ProductStore,
    documents: Vec<Value>,
    now: DateTime<Utc>,
) -> SeedReport {
    let mut report = SeedReport::default();

    for (index, document) in documents.into_iter().enumerate() {
        let id = document.get("id").and_then(Value::as_str).map(str::to_string);
        let name = document.get("name").and_then(Value::as_str).map(str::to_string);

        match insert_one(store, document, now) {
            Ok(()) => {
                tracing::info!(
                    product_id = id.as_deref().unwrap_or_default(),
                    name = name.as_deref().unwrap_or_default(),
                    "Inserted product"
                );
                report.succeeded += 1;
            }
            Err(error) => {
                let failure = SeedFailure {
                    index,
                    id,
                    name,
                    error,
                };
                tracing::warn!(index, "{}", failure);
                report.failures.push(failure);
            }
        }
    }

    report
}

fn insert_one(
    store: &dyn ProductStore,
    document: Value,
    now: DateTime<Utc>,
) -> Result<(), CatalogError> {
    let mut product = Product::from_value(document)?;
    product.validate_new(store.partition_key())?;
    product.stamp_created(now);
    store.create_item(product)?;
    Ok(())
}

/// Count the records in the container.
pub fn container_stats(store: &dyn ProductStore) -> Result<ContainerStats, CatalogError> {
    let info = store.describe();
    let item_count = store.query_items(&QuerySpec::new(usize::MAX))?.len();

    Ok(ContainerStats {
        backend: info.backend,
        database: info.database,
        container: info.container,
        partition_key: vec![format!("/{}", info.partition_key)],
        item_count,
    })
}
