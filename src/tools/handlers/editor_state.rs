// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Editor-state introspection handlers.
//!
//! These tools read live state through [`EditorOps`] and take no or trivial
//! arguments. A missing capability (no workspace, no active file) is a
//! failed tool result the model can react to, not an engine error.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ToolError;
use crate::tools::editor::EditorOps;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};

/// Handler for the `getProjectPath` tool.
pub struct ProjectPathHandler {
    editor: Arc<dyn EditorOps>,
}

impl ProjectPathHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for ProjectPathHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("getProjectPath", "Get the root path of the current project")
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        match self.editor.workspace_root() {
            Some(root) => Ok(ToolOutput::success(root.display().to_string())),
            None => Ok(ToolOutput::error("No workspace folder open")),
        }
    }
}

/// Handler for the `getCurrentFilePath` tool.
pub struct CurrentFileHandler {
    editor: Arc<dyn EditorOps>,
}

impl CurrentFileHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for CurrentFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "getCurrentFilePath",
            "Get the path of the file in the active editor",
        )
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        match self.editor.active_file() {
            Some(path) => Ok(ToolOutput::success(path.display().to_string())),
            None => Ok(ToolOutput::error("No active editor")),
        }
    }
}

/// Handler for the `getAllOpenFiles` tool.
pub struct OpenFilesHandler {
    editor: Arc<dyn EditorOps>,
}

impl OpenFilesHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for OpenFilesHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("getAllOpenFiles", "List the paths of all open files")
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let files = self.editor.open_files();
        if files.is_empty() {
            return Ok(ToolOutput::success("No open files"));
        }
        let listing = files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolOutput::success(listing))
    }
}

/// Handler for the `getCurrentSelection` tool.
pub struct SelectionHandler {
    editor: Arc<dyn EditorOps>,
}

impl SelectionHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for SelectionHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "getCurrentSelection",
            "Get the text currently selected in the active editor",
        )
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        match self.editor.selection() {
            Some(selection) if !selection.text.is_empty() => {
                Ok(ToolOutput::success(selection.text))
            }
            _ => Ok(ToolOutput::error("No text selected")),
        }
    }
}

/// Handler for the `getCurrentLineContent` tool.
pub struct CurrentLineHandler {
    editor: Arc<dyn EditorOps>,
}

impl CurrentLineHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for CurrentLineHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "getCurrentLineContent",
            "Get the full text of the line under the cursor",
        )
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        match self.editor.current_line() {
            Some(line) => Ok(ToolOutput::success(line)),
            None => Ok(ToolOutput::error("No active editor")),
        }
    }
}

/// Handler for the `getCursorInfo` tool.
pub struct CursorInfoHandler {
    editor: Arc<dyn EditorOps>,
}

impl CursorInfoHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for CursorInfoHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "getCursorInfo",
            "Get the cursor position in the active editor",
        )
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        match self.editor.cursor() {
            Some(cursor) => Ok(ToolOutput::success(
                serde_json::json!({
                    "line": cursor.line,
                    "column": cursor.column,
                    "totalLines": cursor.total_lines,
                })
                .to_string(),
            )),
            None => Ok(ToolOutput::error("No active editor")),
        }
    }
}

/// Arguments for the openFileToEdit tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenFileArgs {
    file_path: String,
}

/// Handler for the `openFileToEdit` tool.
pub struct OpenFileHandler {
    editor: Arc<dyn EditorOps>,
}

impl OpenFileHandler {
    pub fn new(editor: Arc<dyn EditorOps>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl ToolHandler for OpenFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("openFileToEdit", "Open a file in the editor").with_schema(
            InputSchema::new()
                .with_property(
                    "filePath",
                    serde_json::json!({
                        "type": "string",
                        "description": "Absolute path of the file to open"
                    }),
                )
                .with_required(vec!["filePath".to_string()]),
        )
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: OpenFileArgs = parse_arguments(&input)?;
        let path = PathBuf::from(&args.file_path);
        self.editor.open_file(&path)?;
        Ok(ToolOutput::success(format!("Opened {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::editor::{CursorInfo, HeadlessEditor, SelectionInfo};
    use std::path::Path;

    struct ScriptedEditor;

    impl EditorOps for ScriptedEditor {
        fn workspace_root(&self) -> Option<PathBuf> {
            Some(PathBuf::from("/work"))
        }

        fn active_file(&self) -> Option<PathBuf> {
            Some(PathBuf::from("/work/src/lib.rs"))
        }

        fn open_files(&self) -> Vec<PathBuf> {
            vec![
                PathBuf::from("/work/src/lib.rs"),
                PathBuf::from("/work/README.md"),
            ]
        }

        fn selection(&self) -> Option<SelectionInfo> {
            Some(SelectionInfo {
                text: "fn main()".to_string(),
                start_line: 3,
                start_column: 0,
                end_line: 3,
                end_column: 9,
            })
        }

        fn current_line(&self) -> Option<String> {
            Some("fn main() {".to_string())
        }

        fn cursor(&self) -> Option<CursorInfo> {
            Some(CursorInfo {
                line: 3,
                column: 4,
                total_lines: 20,
            })
        }

        fn open_file(&self, _path: &Path) -> Result<(), ToolError> {
            Ok(())
        }

        fn confirm(&self, _prompt: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_project_path() {
        let handler = ProjectPathHandler::new(Arc::new(ScriptedEditor));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        assert!(output.success);
        assert_eq!(output.content, "/work");
    }

    #[tokio::test]
    async fn test_project_path_without_workspace() {
        struct NoWorkspace;
        impl EditorOps for NoWorkspace {
            fn workspace_root(&self) -> Option<PathBuf> {
                None
            }
            fn active_file(&self) -> Option<PathBuf> {
                None
            }
            fn open_files(&self) -> Vec<PathBuf> {
                Vec::new()
            }
            fn selection(&self) -> Option<SelectionInfo> {
                None
            }
            fn current_line(&self) -> Option<String> {
                None
            }
            fn cursor(&self) -> Option<CursorInfo> {
                None
            }
            fn open_file(&self, _path: &Path) -> Result<(), ToolError> {
                Ok(())
            }
            fn confirm(&self, _prompt: &str) -> bool {
                false
            }
        }

        let handler = ProjectPathHandler::new(Arc::new(NoWorkspace));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_open_files_listing() {
        let handler = OpenFilesHandler::new(Arc::new(ScriptedEditor));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        assert!(output.content.contains("lib.rs"));
        assert!(output.content.contains("README.md"));
    }

    #[tokio::test]
    async fn test_selection_and_cursor() {
        let handler = SelectionHandler::new(Arc::new(ScriptedEditor));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(output.content, "fn main()");

        let handler = CursorInfoHandler::new(Arc::new(ScriptedEditor));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        let info: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(info["line"], 3);
        assert_eq!(info["totalLines"], 20);
    }

    #[tokio::test]
    async fn test_headless_editor_has_no_selection() {
        let handler = SelectionHandler::new(Arc::new(HeadlessEditor::new("/work")));
        let output = handler.execute(serde_json::json!({})).await.unwrap();
        assert!(!output.success);
    }
}
