// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core type definitions for the Confab chat engine.
//!
//! These types model the conversation transcript, tool definitions, and the
//! events the engine reports to its caller. Wire-format structs for the
//! chat completions API live in [`crate::api`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::ApiError;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    pub content: String,

    /// When the message was appended to the transcript.
    pub timestamp: DateTime<Utc>,

    /// For tool-role messages: the id of the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// For assistant messages that requested tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant message carrying tool-call requests.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = Some(calls);
        msg
    }

    /// A tool-role message answering the call with the given id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// A tool call requested by the model.
///
/// `arguments` is carried as the raw JSON text from the wire; it is parsed
/// at dispatch time so a malformed payload becomes a failed tool result
/// instead of a deserialization error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// JSON schema describing a tool's input parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::new()
    }
}

fn default_schema_type() -> String {
    "object".to_string()
}

/// Definition of a tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::new(),
        }
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Outcome of one model response, buffered or assembled from a stream.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatOutcome {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Events the engine reports to its caller during a turn.
///
/// Exactly one terminal event (`StreamEnd` or `Error`) is emitted per turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The outbound request has been issued (streaming mode).
    StreamStart,

    /// A fragment of assistant text arrived.
    Chunk(String),

    /// The model requested these tools; execution is about to begin.
    ToolsRunning(Vec<String>),

    /// The turn completed normally.
    StreamEnd,

    /// The turn failed or was cancelled.
    Error(String),
}

/// Callback receiving [`TurnEvent`]s.
pub type EventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Callback receiving streamed content deltas.
pub type DeltaFn = Box<dyn Fn(&str) + Send + Sync>;

/// Abstraction over the chat completions backend.
///
/// The production implementation is [`crate::api::ChatClient`]; tests
/// substitute scripted implementations to drive the engine loop.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// One buffered request/response cycle.
    async fn complete(
        &self,
        config: &GenerationConfig,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatOutcome, ApiError>;

    /// One streaming cycle; `on_delta` fires for each content fragment.
    async fn complete_streaming(
        &self,
        config: &GenerationConfig,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        on_delta: DeltaFn,
    ) -> Result<ChatOutcome, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hello");
        assert!(msg.tool_call_id.is_none());
        assert!(msg.tool_calls.is_none());

        let msg = Message::tool_result("call_1", r#"{"success":true}"#);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_assistant_with_calls() {
        let call = ToolCall::new("call_1", "readFile", r#"{"filePath":"/tmp/a"}"#);
        let msg = Message::assistant_with_calls("", vec![call.clone()]);
        assert_eq!(msg.tool_calls.as_ref().unwrap().len(), 1);
        assert_eq!(msg.tool_calls.unwrap()[0], call);
    }

    #[test]
    fn test_input_schema_builder() {
        let schema = InputSchema::new()
            .with_property("filePath", serde_json::json!({"type": "string"}))
            .with_required(vec!["filePath".to_string()]);

        assert_eq!(schema.schema_type, "object");
        assert!(schema.properties.contains_key("filePath"));
        assert_eq!(schema.required, vec!["filePath"]);
    }

    #[test]
    fn test_tool_definition_serialization() {
        let def = ToolDefinition::new("readFile", "Read a file").with_schema(
            InputSchema::new().with_property("filePath", serde_json::json!({"type": "string"})),
        );

        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["name"], "readFile");
        assert_eq!(json["input_schema"]["type"], "object");
    }
}
