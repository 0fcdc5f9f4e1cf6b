use super::{into_result, McpTransport};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use catalog_mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

type Reader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, LinesCodec>;
type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LinesCodec>;

struct Channel {
    reader: Reader,
    writer: Writer,
}

/// Newline-delimited JSON-RPC over a child process's stdin/stdout.
pub struct StdioTransport {
    channel: Mutex<Channel>,
    next_id: AtomicU64,
    // Held so the server is killed when the transport drops.
    _child: Option<Child>,
}

impl StdioTransport {
    /// Spawn `command` and talk to it over its standard streams.
    pub fn spawn(command: &str, args: &[String]) -> AgentResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::transport(format!("failed to start '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::transport("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::transport("child stdout unavailable"))?;

        tracing::debug!(command, "Spawned tool server");

        let mut transport = Self::from_streams(Box::new(stdout), Box::new(stdin));
        transport._child = Some(child);
        Ok(transport)
    }

    /// Use already-open streams, e.g. an in-process server.
    pub fn from_streams(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Self {
        Self {
            channel: Mutex::new(Channel {
                reader: FramedRead::new(reader, LinesCodec::new()),
                writer: FramedWrite::new(writer, LinesCodec::new()),
            }),
            next_id: AtomicU64::new(1),
            _child: None,
        }
    }

    async fn send(channel: &mut Channel, message: &JsonRpcRequest) -> AgentResult<()> {
        let line = serde_json::to_string(message)?;
        channel
            .writer
            .send(line)
            .await
            .map_err(|e| AgentError::transport(format!("write failed: {}", e)))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let mut channel = self.channel.lock().await;
        Self::send(&mut channel, &request).await?;

        loop {
            let line = match channel.reader.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(AgentError::transport(format!("read failed: {}", e))),
                None => return Err(AgentError::transport("tool server closed the connection")),
            };
            if line.trim().is_empty() {
                continue;
            }

            let response: JsonRpcResponse = match serde_json::from_str(&line) {
                Ok(response) => response,
                Err(_) => {
                    tracing::debug!(line = %line, "Skipping non-response line");
                    continue;
                }
            };
            if response.id != Value::from(id) {
                tracing::debug!(id = %response.id, "Skipping response for another request");
                continue;
            }
            return into_result(response);
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()> {
        let notification = JsonRpcRequest::notification(method, params);
        let mut channel = self.channel.lock().await;
        Self::send(&mut channel, &notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{open_store, StoreConfig};
    use catalog_mcp::tools::{register_product_tools, ToolRegistry};
    use catalog_mcp::McpServer;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    fn in_process_server() -> StdioTransport {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);

        let mut registry = ToolRegistry::new();
        register_product_tools(&mut registry, open_store(&StoreConfig::new("memory:")).unwrap(), None)
            .unwrap();
        let server = McpServer::new(registry);
        tokio::spawn(async move { server.serve(server_read, server_write).await });

        let (client_read, client_write) = tokio::io::split(client_side);
        StdioTransport::from_streams(Box::new(client_read), Box::new(client_write))
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let transport = in_process_server();

        let result = transport.request("ping", None).await.unwrap();
        assert_eq!(result, json!({}));

        transport.notify("notifications/initialized", None).await.unwrap();

        let tools = transport.request("tools/list", None).await.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_protocol_error_surfaces() {
        let transport = in_process_server();
        let err = transport.request("resources/list", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol { code: -32601, .. }));
    }

    #[tokio::test]
    async fn test_skips_noise_and_detects_eof() {
        let (client_side, mut server_side) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_side);
        let transport = StdioTransport::from_streams(Box::new(client_read), Box::new(client_write));

        server_side
            .write_all(b"starting up...\n{\"jsonrpc\":\"2.0\",\"id\":99,\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n")
            .await
            .unwrap();

        let result = transport.request("ping", None).await.unwrap();
        assert_eq!(result, json!({"ok": true}));

        drop(server_side);
        let err = transport.request("ping", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }
}
