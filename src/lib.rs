// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Confab - tool-augmented conversations for OpenAI-compatible endpoints.
//!
//! A conversation engine that lets a chat model call built-in workspace
//! tools and tools exposed by MCP (Model Context Protocol) servers, with
//! streaming output and cancellation.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (Message, ToolDefinition, ChatApi, TurnEvent)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration file loading and the shared config store
//! - [`api`] - The chat/completions HTTP client and SSE stream assembler
//! - [`tools`] - Built-in tool handlers and registry
//! - [`mcp`] - MCP server connections over stdio, SSE, and websocket
//! - [`resolver`] - Name resolution and dispatch across builtins and providers
//! - [`engine`] - The bounded tool-calling conversation loop
//! - [`telemetry`] - Tracing, metrics, and observability infrastructure
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use confab::api::ChatClient;
//! use confab::config::ConfigStore;
//! use confab::engine::ConversationEngine;
//! use confab::mcp::McpRegistry;
//! use confab::tools::{default_registry, HeadlessEditor};
//!
//! let store = Arc::new(ConfigStore::load("confab.json")?);
//! let editor = Arc::new(HeadlessEditor::new("."));
//! let builtins = Arc::new(default_registry(editor));
//! let providers = Arc::new(McpRegistry::new(".", store.servers()));
//! let mut engine = ConversationEngine::new(
//!     Arc::new(ChatClient::new()),
//!     builtins,
//!     providers,
//!     store,
//! );
//! let reply = engine.send("hello", Arc::new(|_| {})).await?;
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod resolver;
pub mod telemetry;
pub mod tools;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ApiError, ConfigError, EngineError, Result, ToolError};
pub use engine::{CancelHandle, ConversationEngine, MAX_TOOL_ITERATIONS};
pub use types::{
    ChatApi, ChatOutcome, EventSink, InputSchema, Message, Role, ToolCall, ToolDefinition,
    TurnEvent,
};

/// Confab version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let msg = Message::user("test");
        assert_eq!(msg.role, Role::User);
        let def = ToolDefinition::new("readFile", "Read a file");
        assert_eq!(def.input_schema.schema_type, "object");
    }
}
