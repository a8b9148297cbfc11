// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC 2.0 transports for MCP servers.
//!
//! Three transports are supported: a stdio child process exchanging
//! newline-delimited frames over its pipes, HTTP POST where the reply is
//! plain JSON or wrapped in a short `text/event-stream` body, and a
//! websocket carrying one frame per message. All three match replies to
//! requests by id.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::config::{expand_workspace_folder, StdioParams, UrlParams};
use super::error::McpError;

/// A JSON-RPC request/notify channel to one server.
#[async_trait]
pub trait Transport: Send {
    /// Send a request and wait for the matching reply's `result`.
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError>;

    /// Send a notification (no reply expected).
    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError>;

    /// Tear down the underlying channel.
    async fn close(&mut self);
}

fn request_frame(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

fn notification_frame(method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Extract `result` from a reply, mapping JSON-RPC errors.
fn unwrap_reply(mut reply: Value) -> Result<Value, McpError> {
    if let Some(error) = reply.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(McpError::Protocol(message.to_string()));
    }
    Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

/// Does this frame answer the request with the given id?
fn matches_id(frame: &Value, id: u64) -> bool {
    frame.get("id").and_then(|v| v.as_u64()) == Some(id)
}

/// Stdio child-process transport.
pub struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl StdioTransport {
    /// Spawn the server process with `${workspaceFolder}` expanded in args
    /// and env values.
    pub fn spawn(params: &StdioParams, workspace_root: &Path) -> Result<Self, McpError> {
        let mut command = Command::new(&params.command);
        for arg in &params.args {
            command.arg(expand_workspace_folder(arg, workspace_root));
        }
        for (key, value) in &params.env {
            command.env(key, expand_workspace_folder(value, workspace_root));
        }
        if let Some(cwd) = &params.cwd {
            command.current_dir(expand_workspace_folder(cwd, workspace_root));
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| McpError::Transport(format!("failed to spawn {}: {e}", params.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("child stdout unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<(), McpError> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        self.next_id += 1;
        let id = self.next_id;
        self.write_line(&request_frame(id, method, params)).await?;

        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).await?;
            if n == 0 {
                return Err(McpError::Transport("server closed stdout".to_string()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let frame: Value = match serde_json::from_str(trimmed) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "skipping non-JSON line from server");
                    continue;
                }
            };
            // Server-initiated notifications and stale replies are skipped.
            if matches_id(&frame, id) {
                return unwrap_reply(frame);
            }
            debug!(method, "skipping frame with unmatched id");
        }
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError> {
        self.write_line(&notification_frame(method, params)).await
    }

    async fn close(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// HTTP POST transport.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
    next_id: u64,
}

impl HttpTransport {
    pub fn new(params: &UrlParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: params.url.clone(),
            bearer_token: params.bearer_token.clone(),
            next_id: 0,
        }
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, McpError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(McpError::Transport(format!(
                "server returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Some servers wrap the reply in a short event stream; unwrap the
    /// first `data:` record in that case.
    async fn read_reply(response: reqwest::Response) -> Result<Value, McpError> {
        let is_event_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        let text = response
            .text()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        if is_event_stream {
            for line in text.lines() {
                if let Some(data) = line.strip_prefix("data: ") {
                    return Ok(serde_json::from_str(data)?);
                }
            }
            return Err(McpError::Protocol(
                "event stream reply carried no data record".to_string(),
            ));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        self.next_id += 1;
        let response = self
            .post(request_frame(self.next_id, method, params))
            .await?;
        let reply = Self::read_reply(response).await?;
        unwrap_reply(reply)
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError> {
        self.post(notification_frame(method, params)).await?;
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Websocket transport.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl WebSocketTransport {
    pub async fn connect(params: &UrlParams) -> Result<Self, McpError> {
        let mut request = params
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| McpError::Transport(e.to_string()))?;
        if let Some(token) = &params.bearer_token {
            let value = format!("Bearer {token}")
                .parse()
                .map_err(|_| McpError::Transport("invalid bearer token".to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        Ok(Self { stream, next_id: 0 })
    }

    async fn send_text(&mut self, text: String) -> Result<(), McpError> {
        self.stream
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        self.next_id += 1;
        let id = self.next_id;
        self.send_text(request_frame(id, method, params)).await?;

        while let Some(message) = self.stream.next().await {
            let message = message.map_err(|e| McpError::Transport(e.to_string()))?;
            let text = match message {
                WsMessage::Text(text) => text,
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                WsMessage::Close(_) => {
                    return Err(McpError::Transport("server closed connection".to_string()))
                }
                _ => continue,
            };
            let frame: Value = match serde_json::from_str(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "skipping non-JSON websocket frame");
                    continue;
                }
            };
            if matches_id(&frame, id) {
                return unwrap_reply(frame);
            }
        }
        Err(McpError::Transport("websocket stream ended".to_string()))
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError> {
        self.send_text(notification_frame(method, params)).await
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
