// Mapping from catalog errors onto failed tool results

use crate::protocol::CallToolResult;
use catalog_core::error::{CatalogError, ErrorKind};
use serde_json::json;

/// Failed result carrying `{error: {kind, message}}` alongside the text.
pub fn error_result(kind: ErrorKind, message: impl Into<String>) -> CallToolResult {
    let message = message.into();
    CallToolResult::error(message.clone()).with_structured(json!({
        "error": {
            "kind": kind,
            "message": message,
        }
    }))
}

pub fn failure_result(err: &CatalogError) -> CallToolResult {
    let mut result = error_result(err.kind(), err.to_string());
    if err.is_retryable() {
        if let Some(error) = result
            .structured_content
            .as_mut()
            .and_then(|v| v.get_mut("error"))
            .and_then(|v| v.as_object_mut())
        {
            error.insert("retryable".to_string(), json!(true));
        }
    }
    result
}
