// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in tool system.
//!
//! - [`ToolHandler`] trait - core abstraction for tool implementations
//! - [`ToolRegistry`] - order-preserving name-to-handler map, dispatches calls
//! - [`EditorOps`] - capability trait for editor-state introspection and
//!   user confirmation
//! - Individual handlers in the [`handlers`] module
//!
//! Tool names are camelCase on the wire (`readFile`, `getProjectPath`),
//! matching the catalog of the editor extension this engine grew out of.

pub mod editor;
pub mod handlers;
pub mod registry;

pub use editor::{CursorInfo, EditorOps, HeadlessEditor, SelectionInfo};
pub use handlers::default_registry;
pub use registry::{DispatchResult, ToolHandler, ToolOutput, ToolRegistry, ToolRegistryBuilder};

use serde::Deserialize;

use crate::error::ToolError;

/// Parse JSON arguments into a typed struct.
///
/// This is a helper function for tool handlers to deserialize their input.
pub fn parse_arguments<T>(arguments: &serde_json::Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(arguments.clone())
        .map_err(|err| ToolError::InvalidInput(format!("Failed to parse arguments: {err}")))
}

/// Default limit in bytes for file reading results.
pub const DEFAULT_READ_LIMIT_BYTES: usize = 256 * 1024;

/// Maximum matches returned by a file search.
pub const MAX_SEARCH_MATCHES: usize = 200;

/// Truncate text to a maximum byte length, respecting UTF-8 boundaries.
pub fn truncate_text(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }

    if end == 0 {
        return String::new();
    }

    format!("{}... [truncated]", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_short() {
        let text = "Hello, world!";
        assert_eq!(truncate_text(text, 100), text);
    }

    #[test]
    fn test_truncate_text_long() {
        let truncated = truncate_text("Hello, world!", 5);
        assert!(truncated.starts_with("Hello"));
        assert!(truncated.ends_with("[truncated]"));
    }

    #[test]
    fn test_truncate_respects_utf8_boundary() {
        let text = "héllo";
        // Byte 2 lands inside the two-byte é.
        let truncated = truncate_text(text, 2);
        assert!(truncated.starts_with('h'));
    }

    #[test]
    fn test_parse_arguments_error() {
        #[derive(Deserialize)]
        struct Args {
            #[allow(dead_code)]
            file_path: String,
        }
        let result: Result<Args, _> = parse_arguments(&serde_json::json!({"wrong": 1}));
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }
}
