// MCP (Model Context Protocol) server for the product catalog
// Exposes the product tools to agent clients over JSON-RPC

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
