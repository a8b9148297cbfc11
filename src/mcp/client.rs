// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP client and connection registry.
//!
//! [`McpClient`] drives the protocol over a [`Transport`]: the initialize
//! handshake, `tools/list`, and `tools/call`. [`McpRegistry`] keeps one
//! slot per configured server name; connecting an already-live name
//! disconnects it first, and every operation on a name goes through its
//! slot's lock, so per-name operations are serialized.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::config::{ServerConfig, TransportKind};
use super::error::McpError;
use super::transport::{HttpTransport, StdioTransport, Transport, WebSocketTransport};
use super::types::{ConnectionState, McpToolInfo, McpToolResult, ServerInfo};

/// Protocol revision sent in the initialize handshake.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// One server connection.
pub struct McpClient {
    name: String,
    state: ConnectionState,
    server_info: Option<ServerInfo>,
    transport: Option<Box<dyn Transport>>,
}

impl McpClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ConnectionState::Disconnected,
            server_info: None,
            transport: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Open the transport and run the initialize handshake.
    ///
    /// On any failure the client is left `Disconnected` with the transport
    /// torn down.
    pub async fn connect(
        &mut self,
        config: &ServerConfig,
        workspace_root: &Path,
    ) -> Result<(), McpError> {
        if self.is_connected() {
            self.disconnect().await;
        }
        self.state = ConnectionState::Connecting;

        let result = tokio::time::timeout(
            Duration::from_secs(config.startup_timeout_sec),
            self.connect_inner(config, workspace_root),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                self.state = ConnectionState::Connected;
                info!(server = %self.name, "mcp server connected");
                Ok(())
            }
            Ok(Err(e)) => {
                self.teardown().await;
                Err(e)
            }
            Err(_) => {
                self.teardown().await;
                Err(McpError::Timeout {
                    name: self.name.clone(),
                    timeout_secs: config.startup_timeout_sec,
                })
            }
        }
    }

    async fn connect_inner(
        &mut self,
        config: &ServerConfig,
        workspace_root: &Path,
    ) -> Result<(), McpError> {
        let mut transport: Box<dyn Transport> = match config.kind {
            TransportKind::Stdio => {
                Box::new(StdioTransport::spawn(config.stdio_params()?, workspace_root)?)
            }
            TransportKind::Sse => Box::new(HttpTransport::new(config.sse_params()?)),
            TransportKind::Websocket => {
                Box::new(WebSocketTransport::connect(config.websocket_params()?).await?)
            }
        };

        let init = transport
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "confab",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await
            .map_err(|e| McpError::connection_failed(&self.name, e.to_string()))?;

        if let Some(info) = init.get("serverInfo") {
            self.server_info = serde_json::from_value(info.clone()).ok();
        }

        transport
            .notify("notifications/initialized", json!({}))
            .await?;

        self.transport = Some(transport);
        Ok(())
    }

    /// Close the transport and return to `Disconnected`. Idempotent.
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        info!(server = %self.name, "mcp server disconnected");
    }

    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.server_info = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Fetch the server's current tool list. Results are never cached; the
    /// caller sees whatever the server advertises right now. A server that
    /// stops answering hits the timeout rather than hanging the caller.
    pub async fn list_tools(&mut self, timeout_secs: u64) -> Result<Vec<McpToolInfo>, McpError> {
        let name = self.name.clone();
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| McpError::NotConnected(name.clone()))?;

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            transport.request("tools/list", json!({})),
        )
        .await
        .map_err(|_| McpError::Timeout {
            name: name.clone(),
            timeout_secs,
        })??;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        Ok(serde_json::from_value(tools)?)
    }

    /// Invoke a tool with a per-call timeout.
    pub async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Value,
        timeout_secs: u64,
    ) -> Result<McpToolResult, McpError> {
        let name = self.name.clone();
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| McpError::NotConnected(name.clone()))?;

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            transport.request(
                "tools/call",
                json!({ "name": tool, "arguments": arguments }),
            ),
        )
        .await
        .map_err(|_| McpError::Timeout {
            name: name.clone(),
            timeout_secs,
        })?
        .map_err(|e| McpError::tool_call_failed(&name, tool, e.to_string()))?;

        Ok(serde_json::from_value(result)?)
    }

    #[cfg(test)]
    fn with_transport(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            state: ConnectionState::Connected,
            server_info: None,
            transport: Some(transport),
        }
    }
}

/// Registry of configured servers and their live connections.
pub struct McpRegistry {
    workspace_root: PathBuf,
    configs: StdRwLock<Vec<ServerConfig>>,
    connections: RwLock<HashMap<String, Arc<Mutex<McpClient>>>>,
}

impl McpRegistry {
    pub fn new(workspace_root: impl Into<PathBuf>, configs: Vec<ServerConfig>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            configs: StdRwLock::new(configs),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Swap the configured server list (config reload). Live connections
    /// are untouched until reconnected.
    pub fn set_configs(&self, configs: Vec<ServerConfig>) {
        *self.configs.write().unwrap() = configs;
    }

    /// Names in configuration order.
    pub fn configured_names(&self) -> Vec<String> {
        self.configs
            .read()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.configs.read().unwrap().iter().any(|c| c.name == name)
    }

    fn config_for(&self, name: &str) -> Result<ServerConfig, McpError> {
        self.configs
            .read()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| McpError::NotConfigured(name.to_string()))
    }

    async fn slot(&self, name: &str) -> Option<Arc<Mutex<McpClient>>> {
        self.connections.read().await.get(name).cloned()
    }

    async fn slot_or_create(&self, name: &str) -> Arc<Mutex<McpClient>> {
        let mut connections = self.connections.write().await;
        connections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(McpClient::new(name))))
            .clone()
    }

    /// Connect (or reconnect) the named server.
    pub async fn connect(&self, name: &str) -> Result<(), McpError> {
        let config = self.config_for(name)?;
        let slot = self.slot_or_create(name).await;
        let mut client = slot.lock().await;
        client.connect(&config, &self.workspace_root).await
    }

    /// Disconnect the named server. A name with no live connection is a
    /// no-op.
    pub async fn disconnect(&self, name: &str) {
        if let Some(slot) = self.slot(name).await {
            slot.lock().await.disconnect().await;
        }
    }

    /// Names whose connection is currently live.
    pub async fn connected_names(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut names = Vec::new();
        for (name, slot) in connections.iter() {
            if slot.lock().await.is_connected() {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    pub async fn is_connected(&self, name: &str) -> bool {
        match self.slot(name).await {
            Some(slot) => slot.lock().await.is_connected(),
            None => false,
        }
    }

    /// Fresh tool list for one server.
    pub async fn list_tools(&self, name: &str) -> Result<Vec<McpToolInfo>, McpError> {
        let timeout_secs = self
            .config_for(name)
            .map(|c| c.tool_timeout_sec)
            .unwrap_or(30);
        let slot = self
            .slot(name)
            .await
            .ok_or_else(|| McpError::NotConnected(name.to_string()))?;
        let mut client = slot.lock().await;
        client.list_tools(timeout_secs).await
    }

    /// Invoke a tool on one server.
    pub async fn call_tool(
        &self,
        name: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        let timeout_secs = self
            .config_for(name)
            .map(|c| c.tool_timeout_sec)
            .unwrap_or(30);
        let slot = self
            .slot(name)
            .await
            .ok_or_else(|| McpError::NotConnected(name.to_string()))?;
        let mut client = slot.lock().await;
        client.call_tool(tool, arguments, timeout_secs).await
    }

    /// Disconnect everything and drop all slots.
    pub async fn dispose_all(&self) {
        let mut connections = self.connections.write().await;
        for (name, slot) in connections.drain() {
            let mut client = slot.lock().await;
            if client.is_connected() {
                client.disconnect().await;
            } else {
                warn!(server = %name, "disposing idle connection slot");
            }
        }
    }
}
