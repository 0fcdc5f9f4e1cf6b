//! Error types for the agent client.

use catalog_core::llm::LlmError;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The tool server could not be reached or went away.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The tool server answered with a JSON-RPC error.
    #[error("Server error {code}: {message}")]
    Protocol { code: i32, message: String },

    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The model kept requesting tools past the iteration limit.
    #[error("Agent stopped after {0} iterations without a final answer")]
    MaxIterations(usize),

    #[error("Not connected to a tool server")]
    NotConnected,
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl AgentError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
