// Agent client for the product catalog tool server

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod shell;
pub mod transport;

pub use agent::Agent;
pub use client::McpClient;
pub use config::{AgentConfig, ServerTarget};
pub use error::{AgentError, AgentResult};
pub use shell::run_shell;
