// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Conversation engine.
//!
//! One engine owns one transcript. `send` runs a turn: request, execute any
//! tool calls the model asks for, append results, and re-enter, up to
//! [`MAX_TOOL_ITERATIONS`] model responses. The generation config is
//! snapshotted at turn start, and the tool catalog is merged fresh on every
//! iteration so provider tools reflect what each selected server advertises
//! right now; a provider whose listing fails is skipped with a warning.
//!
//! Event contract: streaming turns start with `StreamStart` and deliver
//! `Chunk`s; every turn ends with exactly one terminal event, `StreamEnd`
//! on success or `Error` on failure or cancellation.
//!
//! One request may be in flight per engine. [`CancelHandle::cancel`] is
//! idempotent; it aborts the in-flight request and the engine returns to
//! idle, ready for the next `send`.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{ConfigStore, GenerationConfig};
use crate::error::EngineError;
use crate::mcp::McpRegistry;
use crate::resolver::ToolResolver;
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;
use crate::tools::ToolRegistry;
use crate::types::{ChatApi, ChatOutcome, EventSink, Message, Role, ToolDefinition, TurnEvent};

/// Upper bound on model responses per turn. If the model still requests
/// tool calls on the final allowed response, the turn fails without
/// issuing another request.
pub const MAX_TOOL_ITERATIONS: usize = 10;

type CancelSlot = Arc<Mutex<Option<watch::Sender<bool>>>>;

/// Cloneable handle that aborts the engine's in-flight turn.
#[derive(Clone)]
pub struct CancelHandle {
    slot: CancelSlot,
}

impl CancelHandle {
    /// Cancel the in-flight request, if any. Safe to call repeatedly and
    /// when nothing is running.
    pub fn cancel(&self) {
        if let Some(sender) = self.slot.lock().unwrap().as_ref() {
            let _ = sender.send(true);
        }
    }
}

/// Tool-augmented conversation loop over a [`ChatApi`].
pub struct ConversationEngine {
    api: Arc<dyn ChatApi>,
    builtins: Arc<ToolRegistry>,
    providers: Arc<McpRegistry>,
    resolver: ToolResolver,
    config: Arc<ConfigStore>,
    transcript: Vec<Message>,
    selected: Vec<String>,
    cancel: CancelSlot,
    max_iterations: usize,
}

impl ConversationEngine {
    pub fn new(
        api: Arc<dyn ChatApi>,
        builtins: Arc<ToolRegistry>,
        providers: Arc<McpRegistry>,
        config: Arc<ConfigStore>,
    ) -> Self {
        let resolver = ToolResolver::new(builtins.clone(), providers.clone());
        Self {
            api,
            builtins,
            providers,
            resolver,
            config,
            transcript: Vec::new(),
            selected: Vec::new(),
            cancel: Arc::new(Mutex::new(None)),
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    /// Replace the set of providers whose tools are offered to the model.
    pub fn select_providers(&mut self, names: Vec<String>) {
        self.selected = names;
    }

    pub fn selected_providers(&self) -> &[String] {
        &self.selected
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Drop the conversation history.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// Handle for cancelling the in-flight turn from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            slot: self.cancel.clone(),
        }
    }

    /// Run one turn. Returns the final assistant text.
    pub async fn send(
        &mut self,
        user_text: impl Into<String>,
        sink: EventSink,
    ) -> Result<String, EngineError> {
        let cancel_rx = {
            let mut slot = self.cancel.lock().unwrap();
            if slot.is_some() {
                return Err(EngineError::Busy);
            }
            let (tx, rx) = watch::channel(false);
            *slot = Some(tx);
            rx
        };

        let start = Instant::now();
        let result = self.run_turn(user_text.into(), &sink, cancel_rx).await;
        *self.cancel.lock().unwrap() = None;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("turn", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        // The single terminal event for this turn.
        match &result {
            Ok(_) => sink(TurnEvent::StreamEnd),
            Err(err) => sink(TurnEvent::Error(err.to_string())),
        }
        result
    }

    async fn run_turn(
        &mut self,
        user_text: String,
        sink: &EventSink,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<String, EngineError> {
        let config = self.config.generation();
        config.validate()?;

        self.transcript.push(Message::user(user_text));
        self.apply_system_prompt(&config);

        if config.enable_stream {
            sink(TurnEvent::StreamStart);
        }

        for iteration in 1..=self.max_iterations {
            let catalog = if config.enable_tools {
                // The merge talks to providers, so it races cancellation
                // like the request itself.
                tokio::select! {
                    merged = self.merge_catalog(&config) => Some(merged),
                    _ = cancel_rx.changed() => return Err(EngineError::Cancelled),
                }
            } else {
                None
            };
            let tools = catalog.as_deref().filter(|t| !t.is_empty());

            let outcome = self
                .request_once(&config, tools, sink, &mut cancel_rx)
                .await?;

            if !outcome.has_tool_calls() {
                self.transcript.push(Message::assistant(&outcome.content));
                info!(iteration, "turn complete");
                return Ok(outcome.content);
            }

            self.transcript.push(Message::assistant_with_calls(
                &outcome.content,
                outcome.tool_calls.clone(),
            ));

            if iteration == self.max_iterations {
                return Err(EngineError::ToolLoopExceeded(self.max_iterations));
            }

            if config.enable_stream {
                let names: Vec<String> =
                    outcome.tool_calls.iter().map(|c| c.name.clone()).collect();
                sink(TurnEvent::ToolsRunning(names));
            }

            for call in &outcome.tool_calls {
                let result = self.resolver.dispatch(call, &config, &self.selected).await;
                if !result.success {
                    warn!(tool = %call.name, "tool call failed; result recorded");
                }
                self.transcript
                    .push(Message::tool_result(&call.id, result.content));
            }
        }

        Err(EngineError::ToolLoopExceeded(self.max_iterations))
    }

    async fn request_once(
        &self,
        config: &GenerationConfig,
        tools: Option<&[ToolDefinition]>,
        sink: &EventSink,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<ChatOutcome, EngineError> {
        if config.enable_stream {
            let chunk_sink = sink.clone();
            let request = self.api.complete_streaming(
                config,
                &self.transcript,
                tools,
                Box::new(move |delta| chunk_sink(TurnEvent::Chunk(delta.to_string()))),
            );
            tokio::select! {
                result = request => Ok(result?),
                _ = cancel_rx.changed() => Err(EngineError::Cancelled),
            }
        } else {
            let request = self.api.complete(config, &self.transcript, tools);
            tokio::select! {
                result = request => Ok(result?),
                _ = cancel_rx.changed() => Err(EngineError::Cancelled),
            }
        }
    }

    /// Keep exactly one system message, always first, mirroring the
    /// configured prompt. No configured prompt means no system message.
    fn apply_system_prompt(&mut self, config: &GenerationConfig) {
        let has_system = matches!(self.transcript.first(), Some(m) if m.role == Role::System);
        match config
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            Some(prompt) => {
                if has_system {
                    self.transcript[0].content = prompt.to_string();
                } else {
                    self.transcript.insert(0, Message::system(prompt));
                }
            }
            None => {
                if has_system {
                    self.transcript.remove(0);
                }
            }
        }
    }

    /// Merge the catalog for one iteration: enabled builtins first, then
    /// each selected provider's current tools under qualified names.
    async fn merge_catalog(&self, config: &GenerationConfig) -> Vec<ToolDefinition> {
        let mut catalog = self
            .builtins
            .definitions_where(|name| config.tool_enabled(name));

        for server in &self.selected {
            match self.providers.list_tools(server).await {
                Ok(tools) => {
                    for tool in tools {
                        let schema = serde_json::from_value(tool.input_schema.clone())
                            .unwrap_or_default();
                        let mut def = ToolDefinition::new(
                            tool.qualified_name(server),
                            tool.description.clone().unwrap_or_default(),
                        );
                        def.input_schema = schema;
                        catalog.push(def);
                    }
                }
                Err(err) => {
                    warn!(server = %server, error = %err, "tool listing failed; provider skipped this iteration");
                }
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ApiError;
    use crate::types::{DeltaFn, ToolCall};
    use async_trait::async_trait;

    struct FixedApi {
        content: String,
    }

    #[async_trait]
    impl ChatApi for FixedApi {
        async fn complete(
            &self,
            _config: &GenerationConfig,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatOutcome, ApiError> {
            Ok(ChatOutcome {
                content: self.content.clone(),
                tool_calls: Vec::new(),
            })
        }

        async fn complete_streaming(
            &self,
            config: &GenerationConfig,
            messages: &[Message],
            tools: Option<&[ToolDefinition]>,
            on_delta: DeltaFn,
        ) -> Result<ChatOutcome, ApiError> {
            on_delta(&self.content);
            self.complete(config, messages, tools).await
        }
    }

    fn engine_with(api: Arc<dyn ChatApi>, config: Config) -> ConversationEngine {
        let builtins = Arc::new(ToolRegistry::new());
        let providers = Arc::new(McpRegistry::new("/tmp", vec![]));
        ConversationEngine::new(api, builtins, providers, Arc::new(ConfigStore::from_config(config)))
    }

    fn test_config(system_prompt: Option<&str>) -> Config {
        let mut config = Config::default();
        config.generation.api_key = "sk-test".to_string();
        config.generation.enable_stream = false;
        config.generation.system_prompt = system_prompt.map(|s| s.to_string());
        config
    }

    fn null_sink() -> EventSink {
        Arc::new(|_| {})
    }

    #[tokio::test]
    async fn test_system_prompt_inserted_then_replaced() {
        let api = Arc::new(FixedApi {
            content: "ok".to_string(),
        });
        let mut engine = engine_with(api, test_config(Some("first prompt")));

        engine.send("hi", null_sink()).await.unwrap();
        assert_eq!(engine.transcript()[0].role, Role::System);
        assert_eq!(engine.transcript()[0].content, "first prompt");

        let mut updated = test_config(Some("second prompt"));
        updated.generation.enable_stream = false;
        engine.config.replace(updated);

        engine.send("again", null_sink()).await.unwrap();
        assert_eq!(engine.transcript()[0].content, "second prompt");
        // Still exactly one system message.
        let system_count = engine
            .transcript()
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
    }

    #[tokio::test]
    async fn test_missing_credential_is_fatal() {
        let api = Arc::new(FixedApi {
            content: "ok".to_string(),
        });
        let mut config = test_config(None);
        config.generation.api_key = String::new();
        let mut engine = engine_with(api, config);

        let err = engine.send("hi", null_sink()).await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn test_transcript_grows_in_order() {
        let api = Arc::new(FixedApi {
            content: "answer".to_string(),
        });
        let mut engine = engine_with(api, test_config(None));

        let reply = engine.send("question", null_sink()).await.unwrap();
        assert_eq!(reply, "answer");
        let roles: Vec<Role> = engine.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_cancel_handle_is_idempotent_when_idle() {
        let api = Arc::new(FixedApi {
            content: "ok".to_string(),
        });
        let engine = engine_with(api, test_config(None));
        let handle = engine.cancel_handle();
        handle.cancel();
        handle.cancel();
    }

    struct AlwaysToolCalls;

    #[async_trait]
    impl ChatApi for AlwaysToolCalls {
        async fn complete(
            &self,
            _config: &GenerationConfig,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatOutcome, ApiError> {
            Ok(ChatOutcome {
                content: String::new(),
                tool_calls: vec![ToolCall::new("call_x", "ghost_tool", "{}")],
            })
        }

        async fn complete_streaming(
            &self,
            config: &GenerationConfig,
            messages: &[Message],
            tools: Option<&[ToolDefinition]>,
            _on_delta: DeltaFn,
        ) -> Result<ChatOutcome, ApiError> {
            self.complete(config, messages, tools).await
        }
    }

    #[tokio::test]
    async fn test_tool_loop_cap_fails_on_final_response() {
        let mut engine = engine_with(Arc::new(AlwaysToolCalls), test_config(None));

        let err = engine.send("go", null_sink()).await.unwrap_err();
        assert!(matches!(err, EngineError::ToolLoopExceeded(n) if n == MAX_TOOL_ITERATIONS));

        // Exactly MAX_TOOL_ITERATIONS assistant responses were appended,
        // and the final response's tool calls were not executed.
        let assistants = engine
            .transcript()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        assert_eq!(assistants, MAX_TOOL_ITERATIONS);
        let tool_results = engine
            .transcript()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_results, MAX_TOOL_ITERATIONS - 1);
    }
}
