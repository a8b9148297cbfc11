// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for MCP provider operations.

use thiserror::Error;

/// Errors from provider connections and tool calls.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Server '{0}' is not configured")]
    NotConfigured(String),

    #[error("Server '{0}' is not connected")]
    NotConnected(String),

    #[error("Failed to connect to '{name}': {reason}")]
    ConnectionFailed { name: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Tool call '{tool}' on '{name}' failed: {reason}")]
    ToolCallFailed {
        name: String,
        tool: String,
        reason: String,
    },

    #[error("Operation on '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("Invalid server config for '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },
}

impl McpError {
    pub fn connection_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_call_failed(
        name: impl Into<String>,
        tool: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ToolCallFailed {
            name: name.into(),
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
