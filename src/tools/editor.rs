// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Editor-state capability trait.
//!
//! The engine originally ran inside an editor; tools like
//! `getCurrentSelection` and `getCursorInfo` read live editor state, and
//! mutating tools put a confirmation dialog in front of the user. Outside an
//! editor those capabilities are modeled by [`EditorOps`], injected into the
//! handlers. [`HeadlessEditor`] is the no-editor implementation used by the
//! CLI; tests use scripted implementations.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ToolError;

/// A text selection in the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInfo {
    pub text: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Cursor position in the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorInfo {
    pub line: usize,
    pub column: usize,
    pub total_lines: usize,
}

/// Editor-state access and user interaction.
pub trait EditorOps: Send + Sync {
    /// Root of the current workspace, if any.
    fn workspace_root(&self) -> Option<PathBuf>;

    /// Path of the file in the active editor tab.
    fn active_file(&self) -> Option<PathBuf>;

    /// Paths of every open document.
    fn open_files(&self) -> Vec<PathBuf>;

    /// The active selection, if text is selected.
    fn selection(&self) -> Option<SelectionInfo>;

    /// Full text of the line under the cursor.
    fn current_line(&self) -> Option<String>;

    /// Cursor position in the active document.
    fn cursor(&self) -> Option<CursorInfo>;

    /// Open a file for the user to edit.
    fn open_file(&self, path: &Path) -> Result<(), ToolError>;

    /// Ask the user to approve a mutating operation.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Editor capability for environments without an editor.
///
/// Reports the configured directory as the workspace root and nothing else;
/// confirmation answers with a fixed policy.
pub struct HeadlessEditor {
    root: PathBuf,
    auto_confirm: bool,
}

impl HeadlessEditor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auto_confirm: false,
        }
    }

    /// Approve every confirmation prompt. Used by scripted runs.
    pub fn with_auto_confirm(mut self) -> Self {
        self.auto_confirm = true;
        self
    }
}

impl EditorOps for HeadlessEditor {
    fn workspace_root(&self) -> Option<PathBuf> {
        Some(self.root.clone())
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

    fn open_file(&self, path: &Path) -> Result<(), ToolError> {
        // No editor to hand the file to; record the request.
        info!(path = %path.display(), "open requested with no editor attached");
        Ok(())
    }

    fn confirm(&self, _prompt: &str) -> bool {
        self.auto_confirm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_reports_root_only() {
        let editor = HeadlessEditor::new("/work");
        assert_eq!(editor.workspace_root(), Some(PathBuf::from("/work")));
        assert!(editor.active_file().is_none());
        assert!(editor.open_files().is_empty());
        assert!(editor.selection().is_none());
    }

    #[test]
    fn test_headless_confirm_policy() {
        assert!(!HeadlessEditor::new("/work").confirm("write?"));
        assert!(HeadlessEditor::new("/work").with_auto_confirm().confirm("write?"));
    }
}
