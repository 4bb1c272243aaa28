//! MCP server over stdio for similarity search.

pub mod error;
pub mod server;

pub use server::{McpServer, SimilarChunksRequest, TOOL_NAME};
