// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Edit file tool handler.
//!
//! Applies a batch of exact substring replacements in one pass. With
//! `dryRun` the handler reports what would change without touching the
//! file.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

use crate::error::ToolError;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `editFile` tool.
pub struct EditFileHandler;

/// One replacement in an edit batch.
#[derive(Debug, Deserialize)]
struct Edit {
    /// Exact text to find.
    find: String,

    /// Replacement text.
    replace: String,
}

/// Arguments for the editFile tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditFileArgs {
    /// Absolute path to the file to edit.
    file_path: String,

    /// Replacements, applied in order.
    edits: Vec<Edit>,

    /// Report the outcome without writing.
    #[serde(default)]
    dry_run: bool,
}

#[async_trait]
impl ToolHandler for EditFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("editFile", "Apply substring replacements to a file").with_schema(
            InputSchema::new()
                .with_property(
                    "filePath",
                    serde_json::json!({
                        "type": "string",
                        "description": "The absolute path to the file to edit"
                    }),
                )
                .with_property(
                    "edits",
                    serde_json::json!({
                        "type": "array",
                        "description": "Replacements applied in order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "find": {"type": "string"},
                                "replace": {"type": "string"}
                            },
                            "required": ["find", "replace"]
                        }
                    }),
                )
                .with_property(
                    "dryRun",
                    serde_json::json!({
                        "type": "boolean",
                        "description": "Preview the changes without writing (default: false)"
                    }),
                )
                .with_required(vec!["filePath".to_string(), "edits".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: EditFileArgs = parse_arguments(&input)?;
        let path = PathBuf::from(&args.file_path);

        if !path.is_absolute() {
            return Err(ToolError::InvalidInput(
                "filePath must be an absolute path".to_string(),
            ));
        }
        if args.edits.is_empty() {
            return Err(ToolError::InvalidInput("edits must not be empty".to_string()));
        }
        for (i, edit) in args.edits.iter().enumerate() {
            if edit.find.is_empty() {
                return Err(ToolError::InvalidInput(format!(
                    "edits[{i}].find must not be empty"
                )));
            }
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(path.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to read file: {e}"))
            }
        })?;

        let mut updated = content;
        let mut report = Vec::new();
        for (i, edit) in args.edits.iter().enumerate() {
            let count = updated.matches(&edit.find).count();
            if count == 0 {
                return Err(ToolError::InvalidInput(format!(
                    "edits[{i}]: text not found in file"
                )));
            }
            updated = updated.replace(&edit.find, &edit.replace);
            report.push(format!("edit {i}: {count} replacement(s)"));
        }

        if args.dry_run {
            return Ok(ToolOutput::success(format!(
                "Dry run, no changes written:\n{}",
                report.join("\n")
            )));
        }

        fs::write(&path, &updated)
            .await
            .map_err(|e| ToolError::IoError(format!("Failed to write file: {e}")))?;

        Ok(ToolOutput::success(format!(
            "Applied {} edit(s) to {}:\n{}",
            args.edits.len(),
            path.display(),
            report.join("\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with(temp: &TempDir, content: &str) -> PathBuf {
        let path = temp.path().join("code.rs");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_edits_apply_in_order() {
        let temp = TempDir::new().unwrap();
        let path = file_with(&temp, "alpha beta alpha");

        let output = EditFileHandler
            .execute(serde_json::json!({
                "filePath": path.display().to_string(),
                "edits": [
                    {"find": "alpha", "replace": "gamma"},
                    {"find": "beta", "replace": "delta"}
                ]
            }))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "gamma delta gamma");
    }

    #[tokio::test]
    async fn test_dry_run_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let path = file_with(&temp, "alpha");

        let output = EditFileHandler
            .execute(serde_json::json!({
                "filePath": path.display().to_string(),
                "edits": [{"find": "alpha", "replace": "beta"}],
                "dryRun": true
            }))
            .await
            .unwrap();
        assert!(output.content.contains("Dry run"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha");
    }

    #[tokio::test]
    async fn test_missing_text_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = file_with(&temp, "alpha");

        let err = EditFileHandler
            .execute(serde_json::json!({
                "filePath": path.display().to_string(),
                "edits": [{"find": "zeta", "replace": "beta"}]
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
