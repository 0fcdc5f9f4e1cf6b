// Write-side product tools: create, update and delete

use super::{key_args, object_arg, on_store, partition_schema, product_id_schema};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_document, json_schema_object, Tool};
use anyhow::Result;
use catalog_core::storage::ProductStore;
use catalog_core::types::Product;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn point_properties(store: &dyn ProductStore) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("product_id".to_string(), product_id_schema());
    properties.insert(
        store.partition_key().field().to_string(),
        partition_schema(store.partition_key(), "partition key"),
    );
    properties
}

pub struct CreateProductTool {
    store: Arc<dyn ProductStore>,
}

impl CreateProductTool {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for CreateProductTool {
    fn schema(&self) -> ToolSchema {
        let required = self.store.partition_key().required_fields().join(", ");
        ToolSchema {
            name: "create_product".to_string(),
            description: "Create a new product".to_string(),
            input_schema: json_schema_object(
                json!({
                    "product": json_schema_document(&format!(
                        "Product data; must include {}",
                        required
                    )),
                }),
                vec!["product"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let partition_key = self.store.partition_key();
        let mut product = Product::new(object_arg(&arguments, "product")?);
        let key = product.validate_new(partition_key)?;
        product.stamp_created(Utc::now());

        let created = on_store(&self.store, move |store| store.create_item(product)).await?;
        tracing::info!(product_id = %key.id, partition = %key.partition, "Created product");

        let text = format!(
            "Product '{}' created successfully with ID: {}",
            created.name().unwrap_or_default(),
            key.id
        );
        Ok(CallToolResult::text(text).with_structured(created.into_value()))
    }
}

/// Read, merge and conditionally replace one record
pub struct UpdateProductTool {
    store: Arc<dyn ProductStore>,
}

impl UpdateProductTool {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateProductTool {
    fn schema(&self) -> ToolSchema {
        let field = self.store.partition_key().field();
        let mut properties = point_properties(self.store.as_ref());
        properties.insert(
            "updates".to_string(),
            json_schema_document("Fields to update; each key overwrites the stored value"),
        );

        ToolSchema {
            name: "update_product".to_string(),
            description: "Update an existing product".to_string(),
            input_schema: json_schema_object(
                Value::Object(properties),
                vec!["product_id", field, "updates"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let partition_key = self.store.partition_key();
        let key = key_args(&arguments, partition_key)?;
        let updates = object_arg(&arguments, "updates")?;

        let updated = {
            let key = key.clone();
            on_store(&self.store, move |store| {
                let mut product = store.read_item(&key)?;
                let etag = product.etag();
                product.merge(updates, store.partition_key())?;
                product.touch(Utc::now());
                store.replace_item(&key, product, etag.as_ref())
            })
            .await?
        };
        tracing::info!(product_id = %key.id, partition = %key.partition, "Updated product");

        let text = format!(
            "Product '{}' updated successfully",
            updated.name().unwrap_or_default()
        );
        Ok(CallToolResult::text(text).with_structured(updated.into_value()))
    }
}

pub struct DeleteProductTool {
    store: Arc<dyn ProductStore>,
}

impl DeleteProductTool {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for DeleteProductTool {
    fn schema(&self) -> ToolSchema {
        let field = self.store.partition_key().field();
        ToolSchema {
            name: "delete_product".to_string(),
            description: "Delete a product".to_string(),
            input_schema: json_schema_object(
                Value::Object(point_properties(self.store.as_ref())),
                vec!["product_id", field],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let partition_key = self.store.partition_key();
        let key = key_args(&arguments, partition_key)?;

        {
            let key = key.clone();
            on_store(&self.store, move |store| store.delete_item(&key)).await?;
        }
        tracing::info!(product_id = %key.id, partition = %key.partition, "Deleted product");

        let mut deleted = Map::new();
        deleted.insert("id".to_string(), json!(key.id));
        deleted.insert(partition_key.field().to_string(), json!(key.partition));
        deleted.insert("deleted".to_string(), json!(true));

        Ok(
            CallToolResult::text(format!("Product with ID {} deleted successfully", key.id))
                .with_structured(Value::Object(deleted)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::memory_store;
    use super::*;
    use catalog_core::error::CatalogError;
    use catalog_core::types::{ETag, ProductKey};

    fn widget() -> Value {
        json!({"id": "p1", "category": "Electronics", "name": "Widget", "price": 9.99, "tags": ["a", "b"]})
    }

    fn domain_error(err: anyhow::Error) -> CatalogError {
        err.downcast::<CatalogError>().unwrap()
    }

    fn key() -> ProductKey {
        ProductKey::new("p1", "Electronics").unwrap()
    }

    #[tokio::test]
    async fn test_create_round_trips_payload() {
        let store = memory_store();
        let tool = CreateProductTool::new(store.clone());

        tool.execute(json!({"product": widget()})).await.unwrap();

        let stored = store.read_item(&key()).unwrap();
        let mut expected = Product::from_value(widget()).unwrap();
        for field in ["createdAt", "updatedAt"] {
            expected.set(field, stored.get(field).cloned().unwrap());
        }
        assert_eq!(stored.without_reserved(), expected);
        assert_eq!(stored.get("createdAt"), stored.get("updatedAt"));
    }

    #[tokio::test]
    async fn test_create_keeps_caller_timestamps() {
        let store = memory_store();
        let mut product = widget();
        product["createdAt"] = json!("2024-01-01T00:00:00Z");
        CreateProductTool::new(store.clone())
            .execute(json!({"product": product}))
            .await
            .unwrap();

        let stored = store.read_item(&key()).unwrap();
        assert_eq!(stored.get("createdAt"), Some(&json!("2024-01-01T00:00:00Z")));
        assert_eq!(stored.get("updatedAt"), Some(&json!("2024-01-01T00:00:00Z")));

        let mut backdated = widget();
        backdated["id"] = json!("p2");
        backdated["createdAt"] = json!("2025-01-01T00:00:00Z");
        backdated["updatedAt"] = json!("2020-01-01T00:00:00Z");
        CreateProductTool::new(store.clone())
            .execute(json!({"product": backdated}))
            .await
            .unwrap();

        let stored = store
            .read_item(&ProductKey::new("p2", "Electronics").unwrap())
            .unwrap();
        assert_eq!(stored.get("createdAt"), Some(&json!("2025-01-01T00:00:00Z")));
        assert_eq!(stored.get("updatedAt"), Some(&json!("2025-01-01T00:00:00Z")));
    }

    #[tokio::test]
    async fn test_create_validation_and_conflict() {
        let store = memory_store();
        let tool = CreateProductTool::new(store.clone());

        let err = domain_error(
            tool.execute(json!({"product": {"id": "p2", "name": "Gadget"}}))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            err,
            CatalogError::MissingFields(vec!["category".to_string(), "price".to_string()])
        );

        let err = domain_error(
            tool.execute(json!({"product": {"id": "a/b", "category": "X", "name": "n", "price": 1}}))
                .await
                .unwrap_err(),
        );
        assert_eq!(err.kind().as_str(), "validation_error");

        tool.execute(json!({"product": widget()})).await.unwrap();
        let first = store.read_item(&key()).unwrap();

        let mut again = widget();
        again["name"] = json!("Imposter");
        let err = domain_error(tool.execute(json!({"product": again})).await.unwrap_err());
        assert!(matches!(err, CatalogError::Conflict { .. }));
        assert_eq!(store.read_item(&key()).unwrap(), first);
    }

    #[tokio::test]
    async fn test_update_changes_exactly_one_field() {
        let store = memory_store();
        CreateProductTool::new(store.clone())
            .execute(json!({"product": widget()}))
            .await
            .unwrap();
        let before = store.read_item(&key()).unwrap();

        UpdateProductTool::new(store.clone())
            .execute(json!({"product_id": "p1", "category": "Electronics", "updates": {"price": 12.5, "_etag": "\"forged\""}}))
            .await
            .unwrap();
        let after = store.read_item(&key()).unwrap();

        assert_eq!(after.get("price"), Some(&json!(12.5)));
        assert!(after.timestamp("updatedAt") > before.timestamp("updatedAt"));
        assert_ne!(after.etag(), before.etag());
        assert_ne!(after.etag(), Some(ETag("\"forged\"".to_string())));
        for (field, value) in before.without_reserved().as_map() {
            if field != "price" && field != "updatedAt" {
                assert_eq!(after.get(field), Some(value), "field {} changed", field);
            }
        }
    }

    #[tokio::test]
    async fn test_update_rejects_key_changes_and_missing_records() {
        let store = memory_store();
        let tool = UpdateProductTool::new(store.clone());

        let err = domain_error(
            tool.execute(json!({"product_id": "p1", "category": "Electronics", "updates": {"price": 1}}))
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, CatalogError::NotFound { .. }));

        CreateProductTool::new(store.clone())
            .execute(json!({"product": widget()}))
            .await
            .unwrap();
        let err = domain_error(
            tool.execute(json!({"product_id": "p1", "category": "Electronics", "updates": {"category": "Toys"}}))
                .await
                .unwrap_err(),
        );
        assert_eq!(err.kind().as_str(), "validation_error");
    }

    #[tokio::test]
    async fn test_stale_etag_is_retryable_conflict() {
        let store = memory_store();
        CreateProductTool::new(store.clone())
            .execute(json!({"product": widget()}))
            .await
            .unwrap();

        // A writer that read before a concurrent update holds a stale token
        let stale = store.read_item(&key()).unwrap();
        UpdateProductTool::new(store.clone())
            .execute(json!({"product_id": "p1", "category": "Electronics", "updates": {"price": 11}}))
            .await
            .unwrap();

        let err = store
            .replace_item(&key(), stale.clone(), stale.etag().as_ref())
            .unwrap_err();
        assert_eq!(err.kind().as_str(), "conflict");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = memory_store();
        let tool = DeleteProductTool::new(store.clone());
        let arguments = json!({"product_id": "p1", "category": "Electronics"});

        let err = domain_error(tool.execute(arguments.clone()).await.unwrap_err());
        assert!(matches!(err, CatalogError::NotFound { .. }));

        CreateProductTool::new(store.clone())
            .execute(json!({"product": widget()}))
            .await
            .unwrap();
        let result = tool.execute(arguments).await.unwrap();
        assert_eq!(
            result.structured_content,
            Some(json!({"id": "p1", "category": "Electronics", "deleted": true}))
        );
        assert!(matches!(
            store.read_item(&key()),
            Err(CatalogError::NotFound { .. })
        ));
    }
}
