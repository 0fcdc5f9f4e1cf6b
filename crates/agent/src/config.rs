//! Configuration types for the agent client.

use crate::error::{AgentError, AgentResult};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_COMMAND: &str = "catalog-mcp";
pub const DEFAULT_THREAD_ID: &str = "demo-thread-1";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// How to reach the tool server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerTarget {
    /// Spawn the server and speak JSON-RPC over its stdin/stdout.
    Stdio { command: String, args: Vec<String> },
    /// POST JSON-RPC to a running HTTP server.
    Http { url: Url, timeout: Duration },
}

impl ServerTarget {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args,
        }
    }

    pub fn http(url: &str) -> AgentResult<Self> {
        let url = Url::parse(url).map_err(|e| AgentError::Config(format!("invalid server URL '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::Config(format!(
                "server URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(Self::Http {
            url,
            timeout: Duration::from_secs(30),
        })
    }
}

impl Default for ServerTarget {
    fn default() -> Self {
        Self::stdio(DEFAULT_SERVER_COMMAND, Vec::new())
    }
}

/// Configuration for the agent shell.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server: ServerTarget,
    /// Conversation whose history the shell appends to.
    pub thread_id: String,
    /// Model steps allowed per query.
    pub max_iterations: usize,
}

impl AgentConfig {
    pub fn new(server: ServerTarget) -> Self {
        Self {
            server,
            thread_id: DEFAULT_THREAD_ID.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(ServerTarget::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.server, ServerTarget::stdio("catalog-mcp", vec![]));
        assert_eq!(config.thread_id, "demo-thread-1");
        assert_eq!(config.max_iterations, 10);
    }

    #[test]
    fn test_http_target() {
        let target = ServerTarget::http("http://localhost:8000/mcp").unwrap();
        assert!(matches!(target, ServerTarget::Http { ref url, .. } if url.path() == "/mcp"));

        assert!(matches!(
            ServerTarget::http("ftp://example.com"),
            Err(AgentError::Config(_))
        ));
        assert!(ServerTarget::http("not a url").is_err());
    }
}
