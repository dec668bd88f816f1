//! MCP (Model Context Protocol) Server Implementation
//!
//! This module provides an MCP server over newline-delimited JSON-RPC 2.0,
//! with the `process_document` tool registered on top of it.

pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;


pub use protocol::*;
pub use server::{ConnectionState, McpServer, MessageHandler, ToolHandler};
