// MCP server: JSON-RPC method routing over the tool registry

use crate::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};

pub const SERVER_NAME: &str = "catalog-mcp";

/// Longest request line accepted on stdio
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Serves the registered tools to MCP clients, independent of transport
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw JSON-RPC message. `None` means nothing is sent back.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed JSON-RPC message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(e.to_string()),
                ))
            }
        };
        self.handle(request).await
    }

    /// Dispatch a parsed request. Notifications never get a response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            let id = request.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };

        tracing::debug!(method = %request.method, "Handling request");
        let outcome = match request.method.as_str() {
            "initialize" => to_result(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?;
        let result = self.registry.invoke(&params.name, params.arguments).await;
        to_result(result)
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.serve_lines(reader, writer, MAX_LINE_LENGTH).await
    }

    async fn serve_lines<R, W>(&self, reader: R, writer: W, max_line_length: usize) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, RequestLines::new(max_line_length));
        let mut out = FramedWrite::new(writer, LinesCodec::new());

        tracing::info!(tools = self.registry.len(), "MCP server listening on stdio");

        while let Some(frame) = lines.next().await {
            let response = match frame.context("Failed to read from stdin")? {
                Frame::Line(line) if line.trim().is_empty() => continue,
                Frame::Line(line) => self.handle_message(&line).await,
                Frame::Malformed(reason) => {
                    tracing::warn!(reason = %reason, "Unreadable JSON-RPC line");
                    Some(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error(reason),
                    ))
                }
            };
            if let Some(response) = response {
                let encoded =
                    serde_json::to_string(&response).context("Failed to encode response")?;
                out.send(encoded).await.context("Failed to write to stdout")?;
            }
        }

        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }
}

enum Frame {
    Line(String),
    /// A line that cannot be a JSON-RPC message: not UTF-8, or over the length limit
    Malformed(String),
}

/// Newline framing that reports bad lines as frames so the read loop keeps going.
struct RequestLines {
    inner: LinesCodec,
    max_length: usize,
}

impl RequestLines {
    fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn recover(
        &self,
        decoded: Result<Option<String>, LinesCodecError>,
    ) -> io::Result<Option<Frame>> {
        match decoded {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Malformed(format!(
                "Line exceeds {} bytes",
                self.max_length
            )))),
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Frame::Malformed(e.to_string())))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for RequestLines {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        let decoded = self.inner.decode(buf);
        self.recover(decoded)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        let decoded = self.inner.decode_eof(buf);
        self.recover(decoded)
    }
}

fn to_result(value: impl Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::products::test_support::memory_store;
    use crate::tools::register_product_tools;
    use tokio::io::AsyncWriteExt;

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        register_product_tools(&mut registry, memory_store(), None).unwrap();
        McpServer::new(registry)
    }

    async fn call(server: &McpServer, message: Value) -> JsonRpcResponse {
        server.handle_message(&message.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = server();

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "catalog-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);

        let response = call(&server, json!({"jsonrpc": "2.0", "id": "two", "method": "tools/list"})).await;
        assert_eq!(response.id, json!("two"));
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 6);
        assert!(tools[0]["inputSchema"]["properties"]["product_id"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_results() {
        let server = server();

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
                "name": "get_product",
                "arguments": {"product_id": "nope", "category": "Electronics"}
            }}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"]["kind"], "not_found");
        assert_eq!(result["content"][0]["type"], "text");

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "list_products"}}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["text"], "No products found.");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server();

        let response = server.handle_message("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        let response = call(&server, json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"})).await;
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"arguments": {}}}),
        )
        .await;
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let response = call(&server, json!({"jsonrpc": "2.0", "id": 7})).await;
        assert_eq!(response.id, json!(7));
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_REQUEST);

        assert!(server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_serve_over_pipe() {
        let server = server();
        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server_side);

        let task = tokio::spawn(async move { server.serve(read_half, write_half).await });

        client
            .write_all(
                concat!(
                    r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                    "\n\n",
                    r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
                    "\n"
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let mut responses = FramedRead::new(&mut client, LinesCodec::new());
        let line = responses.next().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, json!(1));
        assert_eq!(response.result, Some(json!({})));

        drop(responses);
        client.shutdown().await.unwrap();
        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_serve_survives_unreadable_lines() {
        let server = server();
        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server_side);

        let task =
            tokio::spawn(async move { server.serve_lines(read_half, write_half, 256).await });

        let mut input = br#"{"jsonrpc":"2.0","id":1,"method":"ping"#.to_vec();
        input.extend_from_slice(b"\xff}\n");
        input.extend_from_slice(&[b'x'; 1024]);
        input.extend_from_slice(b"\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\r\n");
        client.write_all(&input).await.unwrap();

        let mut responses = FramedRead::new(&mut client, LinesCodec::new());
        for _ in 0..2 {
            let line = responses.next().await.unwrap().unwrap();
            let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
            assert_eq!(response.id, Value::Null);
            assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);
        }

        let line = responses.next().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, json!(2));
        assert_eq!(response.result, Some(json!({})));

        drop(responses);
        client.shutdown().await.unwrap();
        drop(client);
        task.await.unwrap().unwrap();
    }
}
