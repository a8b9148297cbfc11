// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool call resolution and dispatch.
//!
//! A requested name resolves builtin-first: an exact match in the built-in
//! catalog always wins, so a provider can never shadow a builtin. Anything
//! else splits on the FIRST underscore into `<provider>_<tool>`; the
//! provider portion never contains an underscore, the tool portion may.
//!
//! Every failure mode, including malformed argument JSON, becomes a uniform
//! `{"success": false, "error": ...}` result the model can read; dispatch
//! itself never aborts the conversation.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::ToolError;
use crate::mcp::McpRegistry;
use crate::tools::ToolRegistry;
use crate::types::ToolCall;

/// Where a requested tool name points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Builtin(String),
    Provider { server: String, tool: String },
}

/// Result of dispatching one tool call, already in envelope form.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,

    /// The `{"success": ..., ...}` envelope, serialized.
    pub content: String,
}

impl ToolOutcome {
    fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            content: json!({"success": true, "result": result.into()}).to_string(),
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: json!({"success": false, "error": error.into()}).to_string(),
        }
    }
}

/// Resolve a requested name to its target.
///
/// Pure over the three name sets, so precedence is testable in isolation.
pub fn resolve_target(
    name: &str,
    is_builtin: impl Fn(&str) -> bool,
    selected: &[String],
    configured: &[String],
) -> Result<ToolTarget, ToolError> {
    if is_builtin(name) {
        return Ok(ToolTarget::Builtin(name.to_string()));
    }

    let Some((server, tool)) = name.split_once('_') else {
        return Err(ToolError::NotFound(name.to_string()));
    };
    if server.is_empty() || tool.is_empty() {
        return Err(ToolError::NotFound(name.to_string()));
    }

    if selected.iter().any(|s| s == server) {
        return Ok(ToolTarget::Provider {
            server: server.to_string(),
            tool: tool.to_string(),
        });
    }
    if configured.iter().any(|s| s == server) {
        return Err(ToolError::ProviderDisabled(server.to_string()));
    }
    Err(ToolError::NotFound(name.to_string()))
}

/// Parse the raw argument payload. Empty or whitespace means no arguments.
fn parse_call_arguments(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(trimmed).map_err(|e| format!("invalid arguments JSON: {e}"))
}

/// Dispatches model-requested tool calls against builtins and providers.
pub struct ToolResolver {
    builtins: Arc<ToolRegistry>,
    providers: Arc<McpRegistry>,
}

impl ToolResolver {
    pub fn new(builtins: Arc<ToolRegistry>, providers: Arc<McpRegistry>) -> Self {
        Self {
            builtins,
            providers,
        }
    }

    /// Execute one call, producing an envelope result in every case.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        config: &GenerationConfig,
        selected: &[String],
    ) -> ToolOutcome {
        let arguments = match parse_call_arguments(&call.arguments) {
            Ok(arguments) => arguments,
            Err(message) => return ToolOutcome::fail(message),
        };

        let configured = self.providers.configured_names();
        let target = resolve_target(
            &call.name,
            |name| self.builtins.contains(name) && config.tool_enabled(name),
            selected,
            &configured,
        );

        debug!(call = %call.name, ?target, "dispatching tool call");

        match target {
            Ok(ToolTarget::Builtin(name)) => match self.builtins.dispatch(&name, arguments).await {
                Ok(result) if !result.is_error => ToolOutcome::ok(result.output.content),
                Ok(result) => ToolOutcome::fail(result.output.content),
                Err(err) => ToolOutcome::fail(err.to_string()),
            },
            Ok(ToolTarget::Provider { server, tool }) => {
                match self.providers.call_tool(&server, &tool, arguments).await {
                    Ok(result) if !result.is_error => ToolOutcome::ok(result.as_text()),
                    Ok(result) => ToolOutcome::fail(result.as_text()),
                    Err(err) => ToolOutcome::fail(err.to_string()),
                }
            }
            Err(err) => ToolOutcome::fail(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_wins_over_provider_split() {
        // "get_weather" is a builtin AND parses as provider "get", tool
        // "weather"; the builtin must win.
        let target = resolve_target(
            "get_weather",
            |n| n == "get_weather",
            &names(&["get"]),
            &names(&["get"]),
        )
        .unwrap();
        assert_eq!(target, ToolTarget::Builtin("get_weather".to_string()));
    }

    #[test]
    fn test_first_underscore_split() {
        let target = resolve_target(
            "serverA_fetch_page",
            |_| false,
            &names(&["serverA"]),
            &names(&["serverA"]),
        )
        .unwrap();
        assert_eq!(
            target,
            ToolTarget::Provider {
                server: "serverA".to_string(),
                tool: "fetch_page".to_string(),
            }
        );
    }

    #[test]
    fn test_known_but_unselected_provider() {
        let err = resolve_target(
            "serverA_fetch",
            |_| false,
            &names(&[]),
            &names(&["serverA"]),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::ProviderDisabled(s) if s == "serverA"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = resolve_target("ghost_fetch", |_| false, &names(&[]), &names(&[])).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn test_unsplittable_name() {
        let err = resolve_target("mystery", |_| false, &names(&["mystery"]), &names(&["mystery"]))
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        assert!(resolve_target("_tool", |_| false, &names(&[]), &names(&[])).is_err());
        assert!(resolve_target("server_", |_| false, &names(&[]), &names(&[])).is_err());
    }

    #[test]
    fn test_disabled_builtin_falls_through() {
        // The allow-list hides the builtin, so the provider split applies.
        let target = resolve_target(
            "files_read",
            |_| false,
            &names(&["files"]),
            &names(&["files"]),
        )
        .unwrap();
        assert!(matches!(target, ToolTarget::Provider { .. }));
    }

    #[test]
    fn test_empty_arguments_mean_no_arguments() {
        assert_eq!(parse_call_arguments("").unwrap(), json!({}));
        assert_eq!(parse_call_arguments("  ").unwrap(), json!({}));
        assert_eq!(
            parse_call_arguments(r#"{"a":1}"#).unwrap(),
            json!({"a": 1})
        );
        assert!(parse_call_arguments("{broken").is_err());
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = ToolOutcome::ok("payload");
        let value: Value = serde_json::from_str(&ok.content).unwrap();
        assert_eq!(value, json!({"success": true, "result": "payload"}));

        let fail = ToolOutcome::fail("boom");
        let value: Value = serde_json::from_str(&fail.content).unwrap();
        assert_eq!(value, json!({"success": false, "error": "boom"}));
    }
}
