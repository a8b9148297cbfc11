// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model Context Protocol provider connections.
//!
//! External tool providers speak JSON-RPC 2.0 over one of three transports:
//! a stdio child process, HTTP POST (plain JSON or SSE-wrapped replies), or
//! a websocket. [`McpRegistry`] owns one connection slot per configured
//! provider name; operations on a name are serialized through its slot, and
//! one provider's failure never affects the others.

mod client;
mod config;
mod error;
mod transport;
mod types;

pub use client::{McpClient, McpRegistry};
pub use config::{expand_workspace_folder, ServerConfig, StdioParams, TransportKind, UrlParams};
pub use error::McpError;
pub use transport::{HttpTransport, StdioTransport, Transport, WebSocketTransport};
pub use types::{ConnectionState, McpContent, McpToolInfo, McpToolResult, ServerInfo};
