// Tool registry and dispatch

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::outcome::{error_result, failure_result};
use anyhow::Result;
use catalog_core::error::{CatalogError, ErrorKind};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated, defaulted arguments.
    ///
    /// `CatalogError`s returned through `anyhow` keep their kind in the
    /// result; anything else is reported as a store error.
    async fn execute(&self, arguments: Value) -> Result<CallToolResult>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    Duplicate(String),
}

struct Entry {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Tool registry, populated once at startup
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique; a second registration is rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let schema = tool.schema();
        if self.by_name.contains_key(&schema.name) {
            return Err(RegistryError::Duplicate(schema.name));
        }
        self.by_name.insert(schema.name.clone(), self.entries.len());
        self.entries.push(Entry { schema, tool });
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entry(name).map(|e| e.tool.clone())
    }

    /// Tool schemas in registration order
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.entries.iter().map(|e| e.schema.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).and_then(|&i| self.entries.get(i))
    }

    /// Route a call to its tool. Always yields a result, never an error.
    pub async fn invoke(&self, name: &str, arguments: Value) -> CallToolResult {
        let started = Instant::now();

        let Some(entry) = self.entry(name) else {
            tracing::warn!(tool = name, "Call to unknown tool");
            return error_result(ErrorKind::ValidationError, format!("Unknown tool: {}", name));
        };

        let arguments = match prepare_arguments(&entry.schema.input_schema, arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "Rejected tool arguments");
                return failure_result(&err);
            }
        };

        let result = match entry.tool.execute(arguments).await {
            Ok(result) => result,
            Err(err) => match err.downcast_ref::<CatalogError>() {
                Some(domain) => {
                    match domain.kind() {
                        ErrorKind::StoreError => {
                            tracing::error!(tool = name, error = %domain, "Tool failed")
                        }
                        _ => tracing::warn!(tool = name, error = %domain, "Tool failed"),
                    }
                    failure_result(domain)
                }
                None => {
                    tracing::error!(tool = name, error = %format!("{:#}", err), "Tool failed");
                    error_result(ErrorKind::StoreError, format!("{:#}", err))
                }
            },
        };

        tracing::info!(
            tool = name,
            duration_ms = started.elapsed().as_millis() as u64,
            outcome = if result.is_error() { "error" } else { "ok" },
            "Tool call completed"
        );
        result
    }
}

/// Check `arguments` against a tool's input schema and fill in defaults.
///
/// Only the subset of JSON Schema produced by the helpers below is understood:
/// an object with typed `properties`, a `required` list and per-property `default`.
pub fn prepare_arguments(schema: &Value, arguments: Value) -> Result<Value, CatalogError> {
    let mut provided = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(CatalogError::validation(
                "arguments",
                format!("expected an object, got {}", type_name(&other)),
            ))
        }
    };

    // Explicit nulls count as absent
    provided.retain(|_, v| !v.is_null());

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let missing: Vec<String> = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|field| !provided.contains_key(*field))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingFields(missing));
    }

    for (field, spec) in properties {
        match provided.get_mut(field) {
            Some(value) => check_type(field, spec, value)?,
            None => {
                if let Some(default) = spec.get("default") {
                    provided.insert(field.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(provided))
}

fn check_type(field: &str, spec: &Value, value: &mut Value) -> Result<(), CatalogError> {
    let Some(expected) = spec.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let ok = match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "integer" => {
            if value.is_i64() || value.is_u64() {
                true
            } else if let Some(f) = value.as_f64().filter(|f| f.fract() == 0.0) {
                *value = Value::from(f as i64);
                true
            } else {
                false
            }
        }
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(CatalogError::validation(
            field,
            format!("expected {}, got {}", expected, type_name(value)),
        ))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// A free-form object argument (a product document, an update patch)
pub fn json_schema_document(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "description": description
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_integer(description: &str) -> Value {
    serde_json::json!({
        "type": "integer",
        "description": description
    })
}

pub fn with_default(mut schema: Value, default: Value) -> Value {
    if let Some(object) = schema.as_object_mut() {
        object.insert("default".to_string(), default);
    }
    schema
}
