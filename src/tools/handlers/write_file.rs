// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Write file tool handler.
//!
//! Writing is confirmation-gated through [`EditorOps::confirm`]; a refusal
//! becomes a failed tool result, never an aborted turn. Parent directories
//! are created as needed.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;

use crate::error::ToolError;
use crate::tools::editor::EditorOps;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `writeFile` tool.
pub struct WriteFileHandler {
    editor: Arc<dyn EditorOps>,
}

impl WriteFileHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

/// Arguments for the writeFile tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteFileArgs {
    /// Absolute path of the file to write.
    file_path: String,

    /// Full contents to write.
    file_data: String,
}

#[async_trait]
impl ToolHandler for WriteFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "writeFile",
            "Write content to a file, creating it if necessary",
        )
        .with_schema(
            InputSchema::new()
                .with_property(
                    "filePath",
                    serde_json::json!({
                        "type": "string",
                        "description": "The absolute path of the file to write"
                    }),
                )
                .with_property(
                    "fileData",
                    serde_json::json!({
                        "type": "string",
                        "description": "The full content to write"
                    }),
                )
                .with_required(vec!["filePath".to_string(), "fileData".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: WriteFileArgs = parse_arguments(&input)?;
        let path = PathBuf::from(&args.file_path);

        if !path.is_absolute() {
            return Err(ToolError::InvalidInput(
                "filePath must be an absolute path".to_string(),
            ));
        }

        let prompt = format!("Write {} bytes to {}?", args.file_data.len(), path.display());
        if !self.editor.confirm(&prompt) {
            return Err(ToolError::Declined(format!(
                "write to {} was not approved",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::IoError(format!("Failed to create parent: {e}")))?;
        }

        fs::write(&path, &args.file_data).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ToolError::PermissionDenied(path.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to write file: {e}"))
            }
        })?;

        Ok(ToolOutput::success(format!(
            "Wrote {} bytes to {}",
            args.file_data.len(),
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::editor::HeadlessEditor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deep/nested/out.txt");
        let handler =
            WriteFileHandler::new(Arc::new(HeadlessEditor::new(temp.path()).with_auto_confirm()));

        let output = handler
            .execute(serde_json::json!({
                "filePath": path.display().to_string(),
                "fileData": "payload"
            }))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_declined_write_fails_without_writing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");
        let handler = WriteFileHandler::new(Arc::new(HeadlessEditor::new(temp.path())));

        let err = handler
            .execute(serde_json::json!({
                "filePath": path.display().to_string(),
                "fileData": "payload"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Declined(_)));
        assert!(!path.exists());
    }
}
