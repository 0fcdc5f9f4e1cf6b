// Natural-language to query translation

use crate::error::CatalogError;
use crate::llm::{ChatMessage, ChatModel};
use crate::types::PartitionKey;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Turns a natural-language request into a query statement.
///
/// The returned text is untrusted: callers parse and validate it with
/// [`super::parse_query`] before anything runs.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, request: &str) -> Result<String, CatalogError>;
}

/// Translator backed by a hosted chat model
pub struct ChatQueryTranslator {
    model: Arc<dyn ChatModel>,
    prompt: String,
}

impl ChatQueryTranslator {
    pub fn new(model: Arc<dyn ChatModel>, partition_key: &PartitionKey) -> Self {
        Self {
            model,
            prompt: system_prompt(partition_key),
        }
    }
}

#[async_trait]
impl QueryTranslator for ChatQueryTranslator {
    async fn translate(&self, request: &str) -> Result<String, CatalogError> {
        let messages = [ChatMessage::system(&self.prompt), ChatMessage::user(request)];
        let completion = self
            .model
            .complete(&messages, &[])
            .await
            .map_err(|e| CatalogError::Translation(e.to_string()))?;

        let statement = completion.message.content.trim().to_string();
        if statement.is_empty() {
            return Err(CatalogError::Translation(
                "model returned an empty query".to_string(),
            ));
        }
        debug!(request, statement = statement.as_str(), "Translated search request");
        Ok(statement)
    }
}

fn system_prompt(partition_key: &PartitionKey) -> String {
    let field = partition_key.field();
    format!(
        r#"You are a product catalog query assistant. Based on user requests, generate a query over the product container.

Each product is a JSON document with these fields:
- id (string): unique product identifier
- {field} (string): partition key, e.g. "Electronics", "Furniture"
- name (string), description (string), brand (string), sku (string), subcategory (string)
- price (number), currency (string)
- inStock (boolean), stockQuantity (number)
- rating (number), reviewCount (number)
- tags (array of strings), images (array of strings)
- specifications (object of string values, e.g. c.specifications.memory)
- createdAt, updatedAt (ISO-8601 strings)

Grammar: SELECT [TOP n] * FROM c [WHERE condition]
Conditions use c.<field> comparisons (=, !=, <, <=, >, >=), AND, OR, NOT, parentheses,
CONTAINS/STARTSWITH/ENDSWITH(c.field, 'text', true) for case-insensitive text matching,
ARRAY_CONTAINS(c.tags, 'value'), IS_DEFINED(c.field), LOWER(c.field) and UPPER(c.field).
The raw user request is available as the parameter @query.

IMPORTANT: Return ONLY the query string without any additional text, markdown formatting, or code blocks.

For example:
- For searching by name: SELECT * FROM c WHERE CONTAINS(c.name, 'MacBook', true)
- For filtering by price: SELECT * FROM c WHERE c.price < 1000
- For a category: SELECT * FROM c WHERE c.{field} = 'Electronics'"#
    )
}
