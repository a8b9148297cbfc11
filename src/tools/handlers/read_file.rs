// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read file tool handler.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

use crate::error::ToolError;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::{truncate_text, DEFAULT_READ_LIMIT_BYTES};
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `readFile` tool.
pub struct ReadFileHandler;

/// Arguments for the readFile tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFileArgs {
    /// Absolute path to the file to read.
    file_path: String,
}

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("readFile", "Read the contents of a file").with_schema(
            InputSchema::new()
                .with_property(
                    "filePath",
                    serde_json::json!({
                        "type": "string",
                        "description": "The absolute path to the file to read"
                    }),
                )
                .with_required(vec!["filePath".to_string()]),
        )
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: ReadFileArgs = parse_arguments(&input)?;
        let path = PathBuf::from(&args.file_path);

        if !path.is_absolute() {
            return Err(ToolError::InvalidInput(
                "filePath must be an absolute path".to_string(),
            ));
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(path.display().to_string())
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                ToolError::PermissionDenied(path.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to read file: {e}"))
            }
        })?;

        Ok(ToolOutput::success(truncate_text(
            &content,
            DEFAULT_READ_LIMIT_BYTES,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, "hello\nworld\n").unwrap();

        let output = ReadFileHandler
            .execute(serde_json::json!({"filePath": path.display().to_string()}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.content, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ghost.txt");

        let err = ReadFileHandler
            .execute(serde_json::json!({"filePath": path.display().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_relative_path_rejected() {
        let err = ReadFileHandler
            .execute(serde_json::json!({"filePath": "relative/path.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
