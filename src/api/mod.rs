// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI-compatible chat completions client.
//!
//! [`ChatClient`] implements [`ChatApi`] over `POST <base>/chat/completions`
//! in both buffered and streaming modes. Request bodies go through one pure
//! function, [`build_request_body`], in both paths: custom body fields merge
//! into the defaults, or replace the body entirely in override mode (the
//! streaming path still forces `stream: true` on top of an override).

pub mod stream;

pub use stream::StreamAssembler;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::ApiError;
use crate::types::{ChatApi, ChatOutcome, DeltaFn, Message, Role, ToolCall, ToolDefinition};

/// Request timeout for both buffered and streaming calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Outgoing message in the wire format.
#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,

    #[serde(rename = "type")]
    kind: &'static str,

    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_call_id: msg.tool_call_id.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: "function",
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }
}

/// Tool definition in the wire format.
#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,

    function: WireToolSpec,
}

#[derive(Debug, Serialize)]
struct WireToolSpec {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireToolSpec {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: serde_json::to_value(&def.input_schema).unwrap_or(json!({})),
            },
        }
    }
}

/// Buffered response shape.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,

    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,

    #[serde(default)]
    arguments: String,
}

/// Error payload shape used by OpenAI-compatible servers.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Build the request body for one call.
///
/// Pure: the same function serves the buffered and streaming paths, so
/// custom body handling cannot drift between them.
pub fn build_request_body(
    config: &GenerationConfig,
    messages: &[Message],
    tools: Option<&[ToolDefinition]>,
    stream: bool,
) -> Value {
    if config.override_default_body {
        // Custom fields replace the body wholesale; only the stream flag is
        // still forced in the streaming path.
        let mut body = Value::Object(config.custom_body_fields.clone());
        if stream {
            body["stream"] = json!(true);
        }
        return body;
    }

    let wire_messages: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
    let mut body = json!({
        "model": config.model,
        "messages": wire_messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });

    if let Some(tools) = tools {
        if !tools.is_empty() {
            let wire_tools: Vec<WireTool> = tools.iter().map(WireTool::from).collect();
            body["tools"] = serde_json::to_value(wire_tools).unwrap_or(json!([]));
            body["tool_choice"] = json!("auto");
        }
    }
    if stream {
        body["stream"] = json!(true);
    }

    if let Value::Object(map) = &mut body {
        for (key, value) in &config.custom_body_fields {
            map.insert(key.clone(), value.clone());
        }
    }
    body
}

/// Map a non-success HTTP status to an [`ApiError`].
pub fn map_error_response(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        401 => ApiError::Unauthorized(message),
        429 => ApiError::RateLimited(message),
        500..=599 => ApiError::Server(message),
        _ => ApiError::api(message, status),
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(DEFAULT_TIMEOUT_SECS)
    } else {
        ApiError::Network(err.to_string())
    }
}

/// HTTP client for the chat completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    fn request(
        &self,
        config: &GenerationConfig,
        body: &Value,
        streaming: bool,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(config.completions_url())
            .header("Content-Type", "application/json");

        for (key, value) in &config.custom_headers {
            request = request.header(key, value);
        }
        // apiKey only fills Authorization when no custom header claims it.
        if !config.api_key.is_empty() && !config.has_authorization_header() {
            request = request.bearer_auth(&config.api_key);
        }
        if streaming {
            request = request
                .header("Accept", "text/event-stream")
                .header("Cache-Control", "no-cache");
        }
        request.json(body)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error_response(status.as_u16(), &body))
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn complete(
        &self,
        config: &GenerationConfig,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatOutcome, ApiError> {
        let body = build_request_body(config, messages, tools, false);
        debug!(model = %config.model, messages = messages.len(), "buffered completion request");

        let response = self
            .request(config, &body, false)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::MalformedResponse("response carried no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.function.name, call.function.arguments))
            .collect();

        Ok(ChatOutcome {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn complete_streaming(
        &self,
        config: &GenerationConfig,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        on_delta: DeltaFn,
    ) -> Result<ChatOutcome, ApiError> {
        let body = build_request_body(config, messages, tools, true);
        debug!(model = %config.model, messages = messages.len(), "streaming completion request");

        let response = self
            .request(config, &body, true)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = Self::check_status(response).await?;

        let mut assembler = StreamAssembler::new();
        let mut byte_stream = response.bytes_stream();
        let mut emit = |delta: &str| on_delta(delta);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Stream(e.to_string()))?;
            assembler.feed(&chunk, &mut emit);
            if assembler.is_finished() {
                break;
            }
        }

        if !assembler.is_finished() {
            warn!("stream ended without a [DONE] marker");
        }

        let (content, tool_calls) = assembler.finish();
        Ok(ChatOutcome {
            content,
            tool_calls,
        })
    }
}
