// Product catalog tools

mod lookup;
mod write;

pub use lookup::{GetProductTool, ListProductsTool, SearchProductsTool};
pub use write::{CreateProductTool, DeleteProductTool, UpdateProductTool};

use crate::protocol::CallToolResult;
use crate::tools::{
    json_schema_integer, json_schema_string, with_default, RegistryError, ToolRegistry,
};
use catalog_core::error::CatalogError;
use catalog_core::query::QueryTranslator;
use catalog_core::storage::ProductStore;
use catalog_core::types::{PartitionKey, Product, ProductKey};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 1000;

/// Register the six product tools against one store.
pub fn register_product_tools(
    registry: &mut ToolRegistry,
    store: Arc<dyn ProductStore>,
    translator: Option<Arc<dyn QueryTranslator>>,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(GetProductTool::new(store.clone())))?;
    registry.register(Arc::new(ListProductsTool::new(store.clone())))?;
    registry.register(Arc::new(CreateProductTool::new(store.clone())))?;
    registry.register(Arc::new(UpdateProductTool::new(store.clone())))?;
    registry.register(Arc::new(DeleteProductTool::new(store.clone())))?;
    registry.register(Arc::new(SearchProductsTool::new(store, translator)))?;
    Ok(())
}

/// Run a store call on the blocking pool, off the async workers.
async fn on_store<T, F>(store: &Arc<dyn ProductStore>, call: F) -> Result<T, CatalogError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ProductStore) -> Result<T, CatalogError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || call(store.as_ref()))
        .await
        .map_err(|e| CatalogError::store(format!("store task failed: {}", e)))?
}

fn product_id_schema() -> Value {
    json_schema_string("The unique identifier of the product")
}

fn partition_schema(partition_key: &PartitionKey, purpose: &str) -> Value {
    json_schema_string(&format!(
        "The {} of the product ({})",
        partition_key.field(),
        purpose
    ))
}

fn limit_schema() -> Value {
    with_default(
        json_schema_integer(&format!(
            "Maximum number of results to return (1-{}, default: {})",
            MAX_LIMIT, DEFAULT_LIMIT
        )),
        json!(DEFAULT_LIMIT),
    )
}

fn string_arg(arguments: &Value, name: &str) -> Result<String, CatalogError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(CatalogError::validation(name, "must be a string")),
        None => Err(CatalogError::MissingFields(vec![name.to_string()])),
    }
}

fn optional_string_arg(arguments: &Value, name: &str) -> Result<Option<String>, CatalogError> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => string_arg(arguments, name).map(Some),
    }
}

fn object_arg(arguments: &Value, name: &str) -> Result<Map<String, Value>, CatalogError> {
    match arguments.get(name) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(CatalogError::validation(name, "must be a JSON object")),
        None => Err(CatalogError::MissingFields(vec![name.to_string()])),
    }
}

/// `product_id` plus the partition-key argument
fn key_args(arguments: &Value, partition_key: &PartitionKey) -> Result<ProductKey, CatalogError> {
    let id = string_arg(arguments, "product_id")?;
    let partition = string_arg(arguments, partition_key.field())?;
    ProductKey::new(id, partition)
}

fn limit_arg(arguments: &Value) -> Result<usize, CatalogError> {
    let limit = match arguments.get("limit") {
        None | Some(Value::Null) => DEFAULT_LIMIT,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| CatalogError::validation("limit", "must be an integer"))?,
    };
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(CatalogError::validation(
            "limit",
            format!("must be between 1 and {}, got {}", MAX_LIMIT, limit),
        ));
    }
    Ok(limit as usize)
}

/// `header` followed by one summary line per product, with `{count, products}` attached
fn listing(header: String, products: Vec<Product>) -> CallToolResult {
    let mut text = header;
    for product in &products {
        text.push('\n');
        text.push_str(&product.summary_line());
    }
    let count = products.len();
    let products: Vec<Value> = products.into_iter().map(Product::into_value).collect();
    CallToolResult::text(text).with_structured(json!({
        "count": count,
        "products": products,
    }))
}


#[cfg(test)]
mod tests {
    use super::test_support::memory_store;
    use super::*;
    use crate::protocol::CallToolResult;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_product_tools(&mut registry, memory_store(), None).unwrap();
        registry
    }

    fn kind(result: &CallToolResult) -> Option<&str> {
        result.structured_content.as_ref()?["error"]["kind"].as_str()
    }

    #[test]
    fn test_tools_registered_in_order() {
        let names: Vec<String> = registry()
            .list_schemas()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "get_product",
                "list_products",
                "create_product",
                "update_product",
                "delete_product",
                "search_products"
            ]
        );
    }

    #[test]
    fn test_registering_twice_is_rejected() {
        let mut registry = registry();
        let err = register_product_tools(&mut registry, memory_store(), None).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("get_product".to_string()));
    }

    #[test]
    fn test_schemas_advertise_defaults_and_required() {
        let schemas = registry().list_schemas();
        let list = schemas.iter().find(|s| s.name == "list_products").unwrap();
        assert_eq!(list.input_schema["properties"]["limit"]["default"], 10);
        assert_eq!(list.input_schema["required"], json!([]));

        let update = schemas.iter().find(|s| s.name == "update_product").unwrap();
        assert_eq!(
            update.input_schema["required"],
            json!(["product_id", "category", "updates"])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_store_calls_leave_the_async_worker() {
        let store = memory_store();
        let worker = std::thread::current().id();

        let ran_on = on_store(&store, |store| {
            store.ping()?;
            Ok(std::thread::current().id())
        })
        .await
        .unwrap();
        assert_ne!(ran_on, worker);

        let err = on_store(&store, |_| -> Result<(), CatalogError> { panic!("store crashed") })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Store(ref m) if m.starts_with("store task failed")));
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(limit_arg(&json!({})).unwrap(), 10);
        assert_eq!(limit_arg(&json!({"limit": 1000})).unwrap(), 1000);
        assert!(limit_arg(&json!({"limit": 0})).is_err());
        assert!(limit_arg(&json!({"limit": 1001})).is_err());
        assert!(limit_arg(&json!({"limit": "5"})).is_err());
    }

    #[tokio::test]
    async fn test_widget_lifecycle() {
        let registry = registry();
        let key = json!({"product_id": "p1", "category": "Electronics"});

        let created = registry
            .invoke(
                "create_product",
                json!({"product": {"id": "p1", "category": "Electronics", "name": "Widget", "price": 9.99}}),
            )
            .await;
        assert!(!created.is_error(), "{}", created.joined_text());
        assert_eq!(
            created.joined_text(),
            "Product 'Widget' created successfully with ID: p1"
        );

        let fetched = registry.invoke("get_product", key.clone()).await;
        assert!(!fetched.is_error());
        let before = fetched.structured_content.unwrap();
        assert_eq!(before["name"], "Widget");

        let updated = registry
            .invoke(
                "update_product",
                json!({"product_id": "p1", "category": "Electronics", "updates": {"price": 12.50}}),
            )
            .await;
        assert_eq!(updated.joined_text(), "Product 'Widget' updated successfully");

        let after = registry
            .invoke("get_product", key.clone())
            .await
            .structured_content
            .unwrap();
        assert_eq!(after["price"], json!(12.5));
        assert_ne!(after["updatedAt"], before["updatedAt"]);
        assert_eq!(after["createdAt"], before["createdAt"]);
        assert_eq!(after["name"], before["name"]);

        let deleted = registry.invoke("delete_product", key.clone()).await;
        assert_eq!(deleted.joined_text(), "Product with ID p1 deleted successfully");

        let missing = registry.invoke("get_product", key).await;
        assert!(missing.is_error());
        assert_eq!(kind(&missing), Some("not_found"));
    }
}
