//! Transports carrying JSON-RPC between the agent and the tool server.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::config::ServerTarget;
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use catalog_mcp::protocol::JsonRpcResponse;
use serde_json::Value;

#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its result.
    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<Value>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()>;
}

/// Open the transport described by `target`.
pub fn connect(target: &ServerTarget) -> AgentResult<Box<dyn McpTransport>> {
    match target {
        ServerTarget::Stdio { command, args } => Ok(Box::new(StdioTransport::spawn(command, args)?)),
        ServerTarget::Http { url, timeout } => Ok(Box::new(HttpTransport::new(url.clone(), *timeout)?)),
    }
}

/// Turn a JSON-RPC response into its result or a protocol error.
fn into_result(response: JsonRpcResponse) -> AgentResult<Value> {
    if let Some(error) = response.error {
        return Err(AgentError::Protocol {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}
