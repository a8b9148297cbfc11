// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Filesystem management handlers: create, stat, copy, rename, delete.
//!
//! Deletion is the only destructive one and gates on user confirmation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::fs;

use crate::error::ToolError;
use crate::tools::editor::EditorOps;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

fn absolute(path: &str, field: &str) -> Result<PathBuf, ToolError> {
    let path = PathBuf::from(path);
    if !path.is_absolute() {
        return Err(ToolError::InvalidInput(format!(
            "{field} must be an absolute path"
        )));
    }
    Ok(path)
}

fn path_schema(description: &str) -> serde_json::Value {
    serde_json::json!({"type": "string", "description": description})
}

/// Handler for the `createDirectory` tool.
pub struct CreateDirectoryHandler;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDirectoryArgs {
    dir_path: String,
}

#[async_trait]
impl ToolHandler for CreateDirectoryHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("createDirectory", "Create a directory and its parents").with_schema(
            InputSchema::new()
                .with_property("dirPath", path_schema("Absolute path of the directory"))
                .with_required(vec!["dirPath".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: CreateDirectoryArgs = parse_arguments(&input)?;
        let path = absolute(&args.dir_path, "dirPath")?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| ToolError::IoError(format!("Failed to create directory: {e}")))?;
        Ok(ToolOutput::success(format!("Created {}", path.display())))
    }
}

/// Handler for the `statFile` tool.
pub struct StatFileHandler;

#[derive(Debug, Deserialize)]
struct StatFileArgs {
    path: String,
}

#[async_trait]
impl ToolHandler for StatFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("statFile", "Get size, kind and mtime for a path").with_schema(
            InputSchema::new()
                .with_property("path", path_schema("Absolute path to inspect"))
                .with_required(vec!["path".to_string()]),
        )
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: StatFileArgs = parse_arguments(&input)?;
        let path = absolute(&args.path, "path")?;

        let metadata = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(path.display().to_string())
            } else {
                ToolError::IoError(e.to_string())
            }
        })?;

        let kind = if metadata.is_dir() { "directory" } else { "file" };
        let modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        Ok(ToolOutput::success(
            serde_json::json!({
                "path": path.display().to_string(),
                "kind": kind,
                "size": metadata.len(),
                "modified": modified,
            })
            .to_string(),
        ))
    }
}

/// Handler for the `copyFile` tool.
pub struct CopyFileHandler;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyFileArgs {
    source_path: String,
    target_path: String,
}

#[async_trait]
impl ToolHandler for CopyFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("copyFile", "Copy a file to a new path").with_schema(
            InputSchema::new()
                .with_property("sourcePath", path_schema("Absolute path of the source file"))
                .with_property("targetPath", path_schema("Absolute path of the copy"))
                .with_required(vec!["sourcePath".to_string(), "targetPath".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: CopyFileArgs = parse_arguments(&input)?;
        let source = absolute(&args.source_path, "sourcePath")?;
        let target = absolute(&args.target_path, "targetPath")?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::IoError(format!("Failed to create parent: {e}")))?;
        }
        let bytes = fs::copy(&source, &target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(source.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to copy: {e}"))
            }
        })?;

        Ok(ToolOutput::success(format!(
            "Copied {bytes} bytes to {}",
            target.display()
        )))
    }
}

/// Handler for the `renameFile` tool.
pub struct RenameFileHandler;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameFileArgs {
    old_path: String,
    new_path: String,
}

#[async_trait]
impl ToolHandler for RenameFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("renameFile", "Rename or move a file").with_schema(
            InputSchema::new()
                .with_property("oldPath", path_schema("Current absolute path"))
                .with_property("newPath", path_schema("New absolute path"))
                .with_required(vec!["oldPath".to_string(), "newPath".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: RenameFileArgs = parse_arguments(&input)?;
        let old = absolute(&args.old_path, "oldPath")?;
        let new = absolute(&args.new_path, "newPath")?;

        fs::rename(&old, &new).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(old.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to rename: {e}"))
            }
        })?;

        Ok(ToolOutput::success(format!(
            "Renamed {} to {}",
            old.display(),
            new.display()
        )))
    }
}

/// Handler for the `deleteFile` tool.
pub struct DeleteFileHandler {
    editor: Arc<dyn EditorOps>,
}

impl DeleteFileHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[derive(Debug, Deserialize)]
struct DeleteFileArgs {
    path: String,
}

#[async_trait]
impl ToolHandler for DeleteFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("deleteFile", "Delete a file").with_schema(
            InputSchema::new()
                .with_property("path", path_schema("Absolute path of the file to delete"))
                .with_required(vec!["path".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: DeleteFileArgs = parse_arguments(&input)?;
        let path = absolute(&args.path, "path")?;

        if !self
            .editor
            .confirm(&format!("Delete {}?", path.display()))
        {
            return Err(ToolError::Declined(format!(
                "delete of {} was not approved",
                path.display()
            )));
        }

        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FileNotFound(path.display().to_string())
            } else {
                ToolError::IoError(format!("Failed to delete: {e}"))
            }
        })?;

        Ok(ToolOutput::success(format!("Deleted {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::editor::HeadlessEditor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_stat_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b");

        CreateDirectoryHandler
            .execute(serde_json::json!({"dirPath": dir.display().to_string()}))
            .await
            .unwrap();
        assert!(dir.is_dir());

        let output = StatFileHandler
            .execute(serde_json::json!({"path": dir.display().to_string()}))
            .await
            .unwrap();
        let stat: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(stat["kind"], "directory");
    }

    #[tokio::test]
    async fn test_copy_then_rename() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        std::fs::write(&source, "data").unwrap();
        let copy = temp.path().join("b.txt");
        let renamed = temp.path().join("c.txt");

        CopyFileHandler
            .execute(serde_json::json!({
                "sourcePath": source.display().to_string(),
                "targetPath": copy.display().to_string()
            }))
            .await
            .unwrap();
        assert!(copy.exists());

        RenameFileHandler
            .execute(serde_json::json!({
                "oldPath": copy.display().to_string(),
                "newPath": renamed.display().to_string()
            }))
            .await
            .unwrap();
        assert!(!copy.exists());
        assert!(renamed.exists());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doomed.txt");
        std::fs::write(&path, "x").unwrap();

        let declined = DeleteFileHandler::new(Arc::new(HeadlessEditor::new(temp.path())));
        let err = declined
            .execute(serde_json::json!({"path": path.display().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Declined(_)));
        assert!(path.exists());

        let approved = DeleteFileHandler::new(Arc::new(
            HeadlessEditor::new(temp.path()).with_auto_confirm(),
        ));
        approved
            .execute(serde_json::json!({"path": path.display().to_string()}))
            .await
            .unwrap();
        assert!(!path.exists());
    }
}
