// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP server configuration.
//!
//! Servers are declared as an ordered list in the config file. Each entry
//! names its transport kind and carries the matching parameter block. The
//! `${workspaceFolder}` placeholder is substituted in stdio args and env
//! values at connect time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::McpError;

/// Placeholder substituted with the workspace root.
pub const WORKSPACE_FOLDER_VAR: &str = "${workspaceFolder}";

fn default_tool_timeout() -> u64 {
    30
}

fn default_startup_timeout() -> u64 {
    10
}

/// Transport selector for a server entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Sse,
    Websocket,
}

/// Parameters for a stdio child-process server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StdioParams {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub cwd: Option<String>,
}

/// Parameters for a URL-based server (sse or websocket).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlParams {
    pub url: String,

    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// One configured MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: TransportKind,

    #[serde(default)]
    pub stdio: Option<StdioParams>,

    #[serde(default)]
    pub sse: Option<UrlParams>,

    #[serde(default)]
    pub websocket: Option<UrlParams>,

    /// Per-call timeout for `tools/call`, in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_sec: u64,

    /// Timeout for the initialize handshake, in seconds.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_sec: u64,
}

impl ServerConfig {
    /// Build a stdio server entry.
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Stdio,
            stdio: Some(StdioParams {
                command: command.into(),
                args,
                env: HashMap::new(),
                cwd: None,
            }),
            sse: None,
            websocket: None,
            tool_timeout_sec: default_tool_timeout(),
            startup_timeout_sec: default_startup_timeout(),
        }
    }

    /// Build an SSE/HTTP server entry.
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Sse,
            stdio: None,
            sse: Some(UrlParams {
                url: url.into(),
                bearer_token: None,
            }),
            websocket: None,
            tool_timeout_sec: default_tool_timeout(),
            startup_timeout_sec: default_startup_timeout(),
        }
    }

    /// Build a websocket server entry.
    pub fn websocket(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Websocket,
            stdio: None,
            sse: None,
            websocket: Some(UrlParams {
                url: url.into(),
                bearer_token: None,
            }),
            tool_timeout_sec: default_tool_timeout(),
            startup_timeout_sec: default_startup_timeout(),
        }
    }

    /// Fetch the parameter block matching `kind`, or a config error.
    pub fn stdio_params(&self) -> Result<&StdioParams, McpError> {
        self.stdio
            .as_ref()
            .ok_or_else(|| McpError::invalid_config(&self.name, "missing stdio parameters"))
    }

    pub fn sse_params(&self) -> Result<&UrlParams, McpError> {
        self.sse
            .as_ref()
            .ok_or_else(|| McpError::invalid_config(&self.name, "missing sse parameters"))
    }

    pub fn websocket_params(&self) -> Result<&UrlParams, McpError> {
        self.websocket
            .as_ref()
            .ok_or_else(|| McpError::invalid_config(&self.name, "missing websocket parameters"))
    }
}

/// Substitute `${workspaceFolder}` with the workspace root.
pub fn expand_workspace_folder(value: &str, workspace_root: &Path) -> String {
    if value.contains(WORKSPACE_FOLDER_VAR) {
        value.replace(WORKSPACE_FOLDER_VAR, &workspace_root.display().to_string())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_server_entry() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "name": "files",
                "type": "stdio",
                "stdio": {
                    "command": "npx",
                    "args": ["-y", "@modelcontextprotocol/server-filesystem", "${workspaceFolder}"]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "files");
        assert_eq!(config.kind, TransportKind::Stdio);
        assert_eq!(config.tool_timeout_sec, 30);
        assert_eq!(config.stdio_params().unwrap().command, "npx");
    }

    #[test]
    fn test_kind_param_mismatch() {
        let config = ServerConfig::sse("remote", "https://example.com/mcp");
        assert!(config.stdio_params().is_err());
        assert!(config.sse_params().is_ok());
    }

    #[test]
    fn test_expand_workspace_folder() {
        let root = PathBuf::from("/home/dev/project");
        assert_eq!(
            expand_workspace_folder("${workspaceFolder}/data", &root),
            "/home/dev/project/data"
        );
        assert_eq!(expand_workspace_folder("plain", &root), "plain");
    }
}
