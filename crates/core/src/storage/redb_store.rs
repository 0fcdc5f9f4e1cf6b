use super::{ProductStore, QuerySpec, StoreInfo};
use crate::config::StoreConfig;
use crate::error::{CatalogError, StartupError};
use crate::types::{ETag, PartitionKey, Product, ProductKey};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Container table: `(partition value, id)` -> JSON document
type ItemTable<'a> = TableDefinition<'a, (&'static str, &'static str), &'static [u8]>;

/// Where the database file lives
#[derive(Debug, Clone, PartialEq)]
enum StoreLocation {
    Memory,
    Directory(PathBuf),
}

impl StoreLocation {
    fn parse(endpoint: &str) -> Result<Self, StartupError> {
        let endpoint = endpoint.trim();
        if endpoint == "memory:" || endpoint == "memory://" {
            return Ok(Self::Memory);
        }
        if endpoint.starts_with("file://") {
            let url = url::Url::parse(endpoint).map_err(|e| StartupError::InvalidConfig {
                key: crate::config::ENV_ENDPOINT,
                message: e.to_string(),
            })?;
            let path = url.to_file_path().map_err(|_| StartupError::InvalidConfig {
                key: crate::config::ENV_ENDPOINT,
                message: format!("'{}' is not a local path", endpoint),
            })?;
            return Ok(Self::Directory(path));
        }
        if endpoint.contains("://") {
            return Err(StartupError::InvalidConfig {
                key: crate::config::ENV_ENDPOINT,
                message: format!("unsupported endpoint scheme in '{}'", endpoint),
            });
        }
        Ok(Self::Directory(PathBuf::from(endpoint)))
    }
}

fn store_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> CatalogError {
    move |e| CatalogError::Store(format!("{}: {}", context, e))
}

fn decode(bytes: &[u8]) -> Result<Product, CatalogError> {
    serde_json::from_slice(bytes).map_err(store_err("Failed to deserialize product"))
}

/// Product container backed by redb
#[derive(Clone)]
pub struct RedbProductStore {
    db: Arc<Database>,
    database: String,
    container: String,
    partition_key: PartitionKey,
}

impl RedbProductStore {
    /// Open (creating if needed) the database and container named in `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StartupError> {
        let location = StoreLocation::parse(&config.endpoint)?;

        tracing::info!(
            endpoint = %config.endpoint,
            database = %config.database,
            container = %config.container,
            credential = config.credential.mode(),
            "Connecting to product store"
        );

        let db = match location {
            StoreLocation::Memory => Database::builder()
                .create_with_backend(InMemoryBackend::new())
                .map_err(|e| StartupError::Connection(e.to_string()))?,
            StoreLocation::Directory(dir) => {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    StartupError::Connection(format!(
                        "Failed to create data directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
                let path = dir.join(format!("{}.redb", config.database));
                Database::create(&path).map_err(|e| {
                    StartupError::Connection(format!("{}: {}", path.display(), e))
                })?
            }
        };

        let store = Self {
            db: Arc::new(db),
            database: config.database.clone(),
            container: config.container.clone(),
            partition_key: config.partition_key.clone(),
        };
        store
            .init_container()
            .map_err(|e| StartupError::Connection(e.to_string()))?;

        tracing::info!("Successfully connected to product store");
        Ok(store)
    }

    fn table(&self) -> ItemTable<'_> {
        TableDefinition::new(&self.container)
    }

    fn init_container(&self) -> Result<(), CatalogError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(store_err("Failed to begin write transaction"))?;
        {
            let _items = write_txn
                .open_table(self.table())
                .map_err(store_err("Failed to open container"))?;
        }
        write_txn
            .commit()
            .map_err(store_err("Failed to commit transaction"))?;
        Ok(())
    }

    /// Stamp the fields the store owns. `_rid` survives replaces.
    fn assign_system_fields(&self, product: &mut Product, rid: Option<String>) {
        let rid = rid.unwrap_or_else(|| BASE64.encode(&uuid::Uuid::new_v4().as_bytes()[..8]));
        product.set(
            "_self",
            Value::String(format!(
                "dbs/{}/colls/{}/docs/{}/",
                self.database, self.container, rid
            )),
        );
        product.set("_rid", Value::String(rid));
        product.set(
            "_etag",
            Value::String(format!("\"{}\"", uuid::Uuid::new_v4())),
        );
        product.set("_attachments", Value::String("attachments/".to_string()));
        product.set("_ts", Value::from(chrono::Utc::now().timestamp()));
    }

    fn ensure_key_matches(&self, key: &ProductKey, product: &Product) -> Result<(), CatalogError> {
        let actual = product.key(&self.partition_key)?;
        if &actual != key {
            return Err(CatalogError::validation(
                "product",
                format!("document key {} does not match target {}", actual, key),
            ));
        }
        Ok(())
    }
}

impl ProductStore for RedbProductStore {
    fn read_item(&self, key: &ProductKey) -> Result<Product, CatalogError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(store_err("Failed to begin read"))?;
        let table = read_txn
            .open_table(self.table())
            .map_err(store_err("Failed to open container"))?;

        let value = table
            .get((key.partition.as_str(), key.id.as_str()))
            .map_err(store_err("Failed to read product"))?;

        match value {
            Some(guard) => decode(guard.value()),
            None => Err(key.not_found()),
        }
    }

    fn create_item(&self, mut product: Product) -> Result<Product, CatalogError> {
        let key = product.key(&self.partition_key)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(store_err("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(self.table())
                .map_err(store_err("Failed to open container"))?;

            let exists = table
                .get((key.partition.as_str(), key.id.as_str()))
                .map_err(store_err("Failed to read product"))?
                .is_some();
            if exists {
                return Err(key.conflict());
            }

            self.assign_system_fields(&mut product, None);
            let value = serde_json::to_vec(&product)
                .map_err(store_err("Failed to serialize product"))?;
            table
                .insert((key.partition.as_str(), key.id.as_str()), value.as_slice())
                .map_err(store_err("Failed to insert product"))?;
        }
        write_txn.commit().map_err(store_err("Failed to commit"))?;

        tracing::debug!(product_id = %key.id, partition = %key.partition, "Created item");
        Ok(product)
    }

    fn replace_item(
        &self,
        key: &ProductKey,
        mut product: Product,
        if_match: Option<&ETag>,
    ) -> Result<Product, CatalogError> {
        self.ensure_key_matches(key, &product)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(store_err("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(self.table())
                .map_err(store_err("Failed to open container"))?;

            let existing = match table
                .get((key.partition.as_str(), key.id.as_str()))
                .map_err(store_err("Failed to read product"))?
            {
                Some(guard) => decode(guard.value())?,
                None => return Err(key.not_found()),
            };

            if let Some(expected) = if_match {
                if existing.etag().as_ref() != Some(expected) {
                    tracing::debug!(product_id = %key.id, "Concurrency token mismatch on replace");
                    return Err(key.precondition_failed());
                }
            }

            let rid = existing
                .get("_rid")
                .and_then(Value::as_str)
                .map(str::to_string);
            self.assign_system_fields(&mut product, rid);
            let value = serde_json::to_vec(&product)
                .map_err(store_err("Failed to serialize product"))?;
            table
                .insert((key.partition.as_str(), key.id.as_str()), value.as_slice())
                .map_err(store_err("Failed to replace product"))?;
        }
        write_txn.commit().map_err(store_err("Failed to commit"))?;

        Ok(product)
    }

    fn delete_item(&self, key: &ProductKey) -> Result<(), CatalogError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(store_err("Failed to begin write"))?;
        {
            let mut table = write_txn
                .open_table(self.table())
                .map_err(store_err("Failed to open container"))?;

            let removed = table
                .remove((key.partition.as_str(), key.id.as_str()))
                .map_err(store_err("Failed to delete product"))?
                .is_some();
            if !removed {
                return Err(key.not_found());
            }
        }
        write_txn.commit().map_err(store_err("Failed to commit"))?;
        Ok(())
    }

    fn query_items(&self, spec: &QuerySpec) -> Result<Vec<Product>, CatalogError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(store_err("Failed to begin read"))?;
        let table = read_txn
            .open_table(self.table())
            .map_err(store_err("Failed to open container"))?;

        let mut products = Vec::new();
        for item in table.iter().map_err(store_err("Failed to iterate products"))? {
            let (key, value) = item.map_err(store_err("Failed to read item"))?;
            let (partition, _id) = key.value();
            if let Some(wanted) = &spec.partition {
                if partition != wanted.as_str() {
                    continue;
                }
            }

            let product = decode(value.value())?;
            if let Some(filter) = &spec.filter {
                if !filter.matches(&product) {
                    continue;
                }
            }
            products.push(product);
        }

        // Deterministic order: id, then partition
        products.sort_by(|a, b| {
            a.id()
                .cmp(&b.id())
                .then_with(|| {
                    a.partition_value(&self.partition_key)
                        .cmp(&b.partition_value(&self.partition_key))
                })
        });
        products.truncate(spec.max_item_count);

        Ok(products)
    }

    fn ping(&self) -> Result<(), CatalogError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(store_err("Failed to begin read"))?;
        read_txn
            .open_table(self.table())
            .map_err(store_err("Failed to open container"))?;
        Ok(())
    }

    fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }

    fn describe(&self) -> StoreInfo {
        StoreInfo {
            backend: "redb",
            database: self.database.clone(),
            container: self.container.clone(),
            partition_key: self.partition_key.field().to_string(),
        }
    }
}
