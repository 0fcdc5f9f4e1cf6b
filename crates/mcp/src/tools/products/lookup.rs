// Read-side product tools: point read, listing and search

use super::{
    key_args, limit_arg, limit_schema, listing, on_store, optional_string_arg, partition_schema,
    product_id_schema, string_arg,
};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, Tool};
use anyhow::Result;
use catalog_core::query::{parse_query, Filter, QueryParams, QuerySchema, QueryTranslator};
use catalog_core::storage::{ProductStore, QuerySpec};
use serde_json::{json, Value};
use std::sync::Arc;

/// Point read by id and partition
pub struct GetProductTool {
    store: Arc<dyn ProductStore>,
}

impl GetProductTool {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for GetProductTool {
    fn schema(&self) -> ToolSchema {
        let field = self.store.partition_key().field();
        let mut properties = serde_json::Map::new();
        properties.insert("product_id".to_string(), product_id_schema());
        properties.insert(
            field.to_string(),
            partition_schema(self.store.partition_key(), "partition key"),
        );

        ToolSchema {
            name: "get_product".to_string(),
            description: "Get a specific product by ID".to_string(),
            input_schema: json_schema_object(Value::Object(properties), vec!["product_id", field]),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let key = key_args(&arguments, self.store.partition_key())?;
        let product = {
            let key = key.clone();
            on_store(&self.store, move |store| store.read_item(&key)).await?
        };

        tracing::info!(product_id = %key.id, partition = %key.partition, "Retrieved product");

        let text = serde_json::to_string_pretty(&product)?;
        Ok(CallToolResult::text(text).with_structured(product.into_value()))
    }
}

/// Bounded listing, optionally scoped to one partition
pub struct ListProductsTool {
    store: Arc<dyn ProductStore>,
}

impl ListProductsTool {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ListProductsTool {
    fn schema(&self) -> ToolSchema {
        let field = self.store.partition_key().field();
        let mut properties = serde_json::Map::new();
        properties.insert(
            field.to_string(),
            partition_schema(self.store.partition_key(), "optional filter"),
        );
        properties.insert("limit".to_string(), limit_schema());

        ToolSchema {
            name: "list_products".to_string(),
            description: format!("List products, optionally filtered by {}", field),
            input_schema: json_schema_object(Value::Object(properties), vec![]),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let field = self.store.partition_key().field();
        let partition = optional_string_arg(&arguments, field)?;
        let limit = limit_arg(&arguments)?;

        let mut spec = QuerySpec::new(limit);
        if let Some(partition) = &partition {
            spec = spec.in_partition(partition.clone());
        }
        let products = on_store(&self.store, move |store| store.query_items(&spec)).await?;

        tracing::info!(
            partition = partition.as_deref().unwrap_or("*"),
            count = products.len(),
            "Listed products"
        );

        if products.is_empty() {
            let text = match &partition {
                Some(partition) => format!("No products found in {} '{}'.", field, partition),
                None => "No products found.".to_string(),
            };
            return Ok(listing(text, products));
        }

        Ok(listing(format!("Found {} products:", products.len()), products))
    }
}

/// Name/description search, optionally translated from natural language
pub struct SearchProductsTool {
    store: Arc<dyn ProductStore>,
    translator: Option<Arc<dyn QueryTranslator>>,
}

impl SearchProductsTool {
    pub fn new(store: Arc<dyn ProductStore>, translator: Option<Arc<dyn QueryTranslator>>) -> Self {
        Self { store, translator }
    }

    /// Ask the translator for a query and vet it before it reaches the store.
    async fn translated_spec(
        &self,
        translator: &dyn QueryTranslator,
        query: &str,
        limit: usize,
    ) -> Result<QuerySpec> {
        let statement = translator.translate(query).await?;
        tracing::debug!(statement = statement.as_str(), "Generated search query");

        let mut params = QueryParams::new();
        params.insert("query".to_string(), json!(query));
        let schema = QuerySchema::products(self.store.partition_key());
        let parsed = parse_query(&statement, &schema, &params)?;

        let mut spec = QuerySpec::new(parsed.limit(limit));
        spec.filter = parsed.filter;
        Ok(spec)
    }
}

#[async_trait::async_trait]
impl Tool for SearchProductsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_products".to_string(),
            description: "Search products by name or description".to_string(),
            input_schema: json_schema_object(
                json!({
                    "query": json_schema_string(
                        "Search term to look for in product names and descriptions"
                    ),
                    "limit": limit_schema(),
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let query = string_arg(&arguments, "query")?;
        let limit = limit_arg(&arguments)?;

        let spec = match &self.translator {
            Some(translator) => self.translated_spec(translator.as_ref(), &query, limit).await?,
            None => QuerySpec::new(limit).with_filter(Filter::text_search(&query)),
        };
        let products = on_store(&self.store, move |store| store.query_items(&spec)).await?;

        tracing::info!(count = products.len(), query = query.as_str(), "Search completed");

        if products.is_empty() {
            return Ok(listing(
                format!("No products found matching '{}'.", query),
                products,
            ));
        }
        Ok(listing(
            format!("Found {} products matching '{}':", products.len(), query),
            products,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::memory_store;
    use super::*;
    use crate::tools::prepare_arguments;
    use catalog_core::error::CatalogError;
    use catalog_core::types::Product;

    fn seed(store: &Arc<dyn ProductStore>) {
        for value in [
            json!({"id": "e1", "category": "Electronics", "name": "MacBook Pro", "price": 2499, "description": "Laptop"}),
            json!({"id": "e2", "category": "Electronics", "name": "USB-C Cable", "price": 19.99, "description": "Works with any macbook"}),
            json!({"id": "e3", "category": "Electronics", "name": "Monitor", "price": 399}),
            json!({"id": "f1", "category": "Furniture", "name": "Standing Desk", "price": 599, "description": "Oak top"}),
        ] {
            store.create_item(Product::from_value(value).unwrap()).unwrap();
        }
    }

    async fn run(tool: &dyn Tool, arguments: Value) -> CallToolResult {
        let arguments = prepare_arguments(&tool.schema().input_schema, arguments).unwrap();
        tool.execute(arguments).await.unwrap()
    }

    fn ids(result: &CallToolResult) -> Vec<String> {
        result.structured_content.as_ref().unwrap()["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_scoped_and_bounded() {
        let store = memory_store();
        seed(&store);
        let tool = ListProductsTool::new(store);

        let result = run(&tool, json!({"category": "Electronics", "limit": 2})).await;
        assert_eq!(ids(&result), vec!["e1", "e2"]);
        assert!(result.joined_text().starts_with("Found 2 products:\n- MacBook Pro (ID: e1, Price: $2499)"));

        let result = run(&tool, json!({"limit": 3})).await;
        assert_eq!(ids(&result).len(), 3);

        let result = run(&tool, json!({"category": "Garden"})).await;
        assert!(!result.is_error());
        assert_eq!(result.joined_text(), "No products found in category 'Garden'.");
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let result = run(&ListProductsTool::new(memory_store()), json!({})).await;
        assert_eq!(result.joined_text(), "No products found.");
        assert_eq!(result.structured_content.unwrap()["count"], 0);
    }

    #[tokio::test]
    async fn test_search_substring_case_insensitive() {
        let store = memory_store();
        seed(&store);
        let tool = SearchProductsTool::new(store, None);

        let result = run(&tool, json!({"query": "MACBOOK"})).await;
        assert_eq!(ids(&result), vec!["e1", "e2"]);
        assert_eq!(
            result.joined_text(),
            "Found 2 products matching 'MACBOOK':\n- MacBook Pro (ID: e1, Price: $2499)\n- USB-C Cable (ID: e2, Price: $19.99)"
        );

        let result = run(&tool, json!({"query": "oak"})).await;
        assert_eq!(ids(&result), vec!["f1"]);

        let result = run(&tool, json!({"query": "toaster"})).await;
        assert!(!result.is_error());
        assert_eq!(result.joined_text(), "No products found matching 'toaster'.");
    }

    struct CannedTranslator(&'static str);

    #[async_trait::async_trait]
    impl QueryTranslator for CannedTranslator {
        async fn translate(&self, _request: &str) -> Result<String, CatalogError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_search_with_translator() {
        let store = memory_store();
        seed(&store);

        let tool = SearchProductsTool::new(
            store.clone(),
            Some(Arc::new(CannedTranslator(
                "```sql\nSELECT TOP 1 * FROM c WHERE c.price < 1000 AND c.category = 'Electronics'\n```",
            ))),
        );
        let result = run(&tool, json!({"query": "cheap electronics"})).await;
        assert_eq!(ids(&result), vec!["e2"]);

        let tool = SearchProductsTool::new(
            store,
            Some(Arc::new(CannedTranslator(
                "SELECT * FROM c WHERE CONTAINS(c.name, @query, true)",
            ))),
        );
        let result = run(&tool, json!({"query": "desk"})).await;
        assert_eq!(ids(&result), vec!["f1"]);
    }

    #[tokio::test]
    async fn test_search_rejects_unvetted_query() {
        let store = memory_store();
        seed(&store);
        let tool = SearchProductsTool::new(
            store,
            Some(Arc::new(CannedTranslator(
                "SELECT * FROM c WHERE c.secret = 'x'",
            ))),
        );

        let arguments = prepare_arguments(&tool.schema().input_schema, json!({"query": "x"})).unwrap();
        let err = tool.execute(arguments).await.unwrap_err();
        let err = err.downcast_ref::<CatalogError>().unwrap();
        assert!(matches!(err, CatalogError::Query(m) if m.contains("secret")));
    }

    #[tokio::test]
    async fn test_get_returns_pretty_record() {
        let store = memory_store();
        seed(&store);
        let tool = GetProductTool::new(store);

        let result = run(&tool, json!({"product_id": "f1", "category": "Furniture"})).await;
        let record = result.structured_content.clone().unwrap();
        assert_eq!(record["name"], "Standing Desk");
        assert!(record.get("_etag").is_some());
        assert!(result.joined_text().starts_with("{\n"));

        let arguments = json!({"product_id": "f1", "category": "Electronics"});
        let err = tool.execute(arguments).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::NotFound { .. })
        ));
    }
}
