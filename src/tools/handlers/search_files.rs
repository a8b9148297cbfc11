// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Search files tool handler.
//!
//! Regex search over a directory tree, optionally filtered by a glob on
//! the relative path. Matches are capped to keep results model-sized.

use async_trait::async_trait;
use globset::Glob;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::MAX_SEARCH_MATCHES;
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `searchFiles` tool.
pub struct SearchFilesHandler;

/// Arguments for the searchFiles tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFilesArgs {
    /// Absolute path of the directory to search.
    dir_path: String,

    /// Regular expression to match against file contents.
    pattern: String,

    /// Optional glob filtering relative paths, e.g. `**/*.rs`.
    #[serde(default)]
    glob: Option<String>,
}

#[async_trait]
impl ToolHandler for SearchFilesHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("searchFiles", "Search file contents with a regex").with_schema(
            InputSchema::new()
                .with_property(
                    "dirPath",
                    serde_json::json!({
                        "type": "string",
                        "description": "The absolute path of the directory to search"
                    }),
                )
                .with_property(
                    "pattern",
                    serde_json::json!({
                        "type": "string",
                        "description": "Regular expression to match"
                    }),
                )
                .with_property(
                    "glob",
                    serde_json::json!({
                        "type": "string",
                        "description": "Optional glob to filter files, e.g. **/*.rs"
                    }),
                )
                .with_required(vec!["dirPath".to_string(), "pattern".to_string()]),
        )
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: SearchFilesArgs = parse_arguments(&input)?;
        let root = PathBuf::from(&args.dir_path);

        if !root.is_absolute() {
            return Err(ToolError::InvalidInput(
                "dirPath must be an absolute path".to_string(),
            ));
        }

        let regex = Regex::new(&args.pattern)
            .map_err(|e| ToolError::InvalidInput(format!("Invalid pattern: {e}")))?;

        let matcher = match &args.glob {
            Some(glob) => Some(
                Glob::new(glob)
                    .map_err(|e| ToolError::InvalidInput(format!("Invalid glob: {e}")))?
                    .compile_matcher(),
            ),
            None => None,
        };

        let mut matches = Vec::new();
        let mut truncated = false;

        'walk: for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if let Some(matcher) = &matcher {
                if !matcher.is_match(relative) {
                    continue;
                }
            }
            // Binary and unreadable files are skipped silently.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for (lineno, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!(
                        "{}:{}: {}",
                        relative.display(),
                        lineno + 1,
                        line.trim_end()
                    ));
                    if matches.len() >= MAX_SEARCH_MATCHES {
                        truncated = true;
                        break 'walk;
                    }
                }
            }
        }

        if matches.is_empty() {
            return Ok(ToolOutput::success("No matches"));
        }
        let mut result = matches.join("\n");
        if truncated {
            result.push_str("\n... [match limit reached]");
        }
        Ok(ToolOutput::success(result))
    }
}
