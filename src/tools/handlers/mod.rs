// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in tool handlers.
//!
//! Wire names are camelCase (`readFile`, `getProjectPath`), kept from the
//! editor extension's catalog so transcripts stay compatible.

mod edit_file;
mod editor_state;
mod fs_ops;
mod read_directory;
mod read_file;
mod search_files;
mod write_file;

pub use edit_file::EditFileHandler;
pub use editor_state::{
    CurrentFileHandler, CurrentLineHandler, CursorInfoHandler, OpenFileHandler,
    OpenFilesHandler, ProjectPathHandler, SelectionHandler,
};
pub use fs_ops::{
    CopyFileHandler, CreateDirectoryHandler, DeleteFileHandler, RenameFileHandler,
    StatFileHandler,
};
pub use read_directory::ReadDirectoryHandler;
pub use read_file::ReadFileHandler;
pub use search_files::SearchFilesHandler;
pub use write_file::WriteFileHandler;

use std::sync::Arc;

use super::editor::EditorOps;
use super::registry::{ToolRegistry, ToolRegistryBuilder};

/// Build the default catalog, in the order it is advertised to the model.
pub fn default_registry(editor: Arc<dyn EditorOps>) -> ToolRegistry {
    let mut builder = ToolRegistryBuilder::new();

    builder.register(ProjectPathHandler::new(editor.clone()));
    builder.register(ReadDirectoryHandler);
    builder.register(ReadFileHandler);
    builder.register(WriteFileHandler::new(editor.clone()));
    builder.register(EditFileHandler);
    builder.register(SearchFilesHandler);
    builder.register(CurrentFileHandler::new(editor.clone()));
    builder.register(OpenFilesHandler::new(editor.clone()));
    builder.register(SelectionHandler::new(editor.clone()));
    builder.register(CurrentLineHandler::new(editor.clone()));
    builder.register(CursorInfoHandler::new(editor.clone()));
    builder.register(OpenFileHandler::new(editor.clone()));
    builder.register(CreateDirectoryHandler);
    builder.register(StatFileHandler);
    builder.register(CopyFileHandler);
    builder.register(RenameFileHandler);
    builder.register(DeleteFileHandler::new(editor));

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::editor::HeadlessEditor;

    #[test]
    fn test_default_registry_order_starts_with_project_path() {
        let registry = default_registry(Arc::new(HeadlessEditor::new("/tmp")));
        let names = registry.tool_names();
        assert_eq!(names[0], "getProjectPath");
        assert!(names.contains(&"readFile".to_string()));
        assert!(names.contains(&"writeFile".to_string()));
        assert!(names.contains(&"deleteFile".to_string()));
    }
}
