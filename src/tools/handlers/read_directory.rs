// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read directory tool handler.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

use crate::error::ToolError;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `readDirectory` tool.
pub struct ReadDirectoryHandler;

/// Arguments for the readDirectory tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadDirectoryArgs {
    /// Absolute path to the directory to list.
    dir_path: String,
}

#[async_trait]
impl ToolHandler for ReadDirectoryHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("readDirectory", "List the entries of a directory").with_schema(
            InputSchema::new()
                .with_property(
                    "dirPath",
                    serde_json::json!({
                        "type": "string",
                        "description": "The absolute path to the directory to list"
                    }),
                )
                .with_required(vec!["dirPath".to_string()]),
        )
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: ReadDirectoryArgs = parse_arguments(&input)?;
        let path = PathBuf::from(&args.dir_path);

        if !path.is_absolute() {
            return Err(ToolError::InvalidInput(
                "dirPath must be an absolute path".to_string(),
            ));
        }

        let mut reader = fs::read_dir(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(path.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to read directory: {e}"))
            }
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::IoError(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = entry
                .file_type()
                .await
                .map_err(|e| ToolError::IoError(e.to_string()))?;
            if kind.is_dir() {
                entries.push(format!("{name}/"));
            } else {
                entries.push(name);
            }
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolOutput::success("(empty directory)"));
        }
        Ok(ToolOutput::success(entries.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_directory_with_kind_markers() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();

        let output = ReadDirectoryHandler
            .execute(serde_json::json!({"dirPath": temp.path().display().to_string()}))
            .await
            .unwrap();
        assert_eq!(output.content, "a.txt\nsub/");
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let output = ReadDirectoryHandler
            .execute(serde_json::json!({"dirPath": temp.path().display().to_string()}))
            .await
            .unwrap();
        assert_eq!(output.content, "(empty directory)");
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope");
        let err = ReadDirectoryHandler
            .execute(serde_json::json!({"dirPath": path.display().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }
}
