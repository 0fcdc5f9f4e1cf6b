//! JSON-RPC over HTTP POST.

use super::{into_result, McpTransport};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use catalog_mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Posts each JSON-RPC message to a single endpoint.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    url: Url,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: Url, timeout: Duration) -> AgentResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn post(&self, message: &JsonRpcRequest) -> AgentResult<Response> {
        debug!(url = %self.url, method = %message.method, "POST request");

        let response = self.client.post(self.url.clone()).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::transport(format!(
                "server returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let body = response.text().await?;
        let response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::transport(format!("invalid JSON-RPC response: {}", e)))?;
        into_result(response)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()> {
        self.post(&JsonRpcRequest::notification(method, params)).await?;
        Ok(())
    }
}
