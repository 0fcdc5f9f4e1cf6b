//! MCP client session over a transport.

use crate::error::{AgentError, AgentResult};
use crate::transport::McpTransport;
use catalog_mcp::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, ListToolsResult, ToolSchema, PROTOCOL_VERSION,
};
use serde_json::Value;
use tracing::{debug, info};

pub const CLIENT_NAME: &str = "catalog-agent";

/// An initialized session with a tool server.
pub struct McpClient {
    transport: Option<Box<dyn McpTransport>>,
    server: InitializeResult,
    tools: Vec<ToolSchema>,
}

impl McpClient {
    /// Run the handshake and discover the server's tools.
    pub async fn connect(transport: Box<dyn McpTransport>) -> AgentResult<Self> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let result = transport
            .request("initialize", Some(serde_json::to_value(&params)?))
            .await?;
        let server: InitializeResult = serde_json::from_value(result)?;

        if server.protocol_version != PROTOCOL_VERSION {
            debug!(
                server_version = %server.protocol_version,
                "Server negotiated a different protocol version"
            );
        }

        transport.notify("notifications/initialized", None).await?;

        let listed: ListToolsResult =
            serde_json::from_value(transport.request("tools/list", None).await?)?;

        info!(
            server = %server.server_info.name,
            tools = listed.tools.len(),
            "Connected to tool server"
        );

        Ok(Self {
            transport: Some(transport),
            server,
            tools: listed.tools,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server.server_info.name
    }

    /// Tools discovered at connect time, in server order.
    pub fn tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    /// Invoke a tool and return its text content.
    ///
    /// Error results come back as `Ok` text so the model can read them.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> AgentResult<String> {
        let transport = self.transport.as_ref().ok_or(AgentError::NotConnected)?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = transport
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)?;

        if result.is_error() {
            debug!(tool = name, "Tool returned an error result");
        }
        Ok(result.joined_text())
    }

    /// Drop the transport, stopping a spawned server.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            debug!("Disconnected from tool server");
        }
    }
}
