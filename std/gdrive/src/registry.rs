//! Static catalog of the tools this server publishes.
//!
//! Input schemas are derived from the dispatcher's argument types, so the
//! published schema and the decoded arguments cannot drift apart.

use crate::tools::{
    CreateFolderInput, FileIdInput, ListRecentInput, MoveFileInput, NoInput, SearchInput,
    ToolInput, UploadFileInput,
};
use rmcp::model::{JsonObject, Tool};
use rmcp::schemars;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> JsonObject,
}

impl ToolDefinition {
    const fn new<I: ToolInput>(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            schema: schema_of::<I>,
        }
    }

    /// JSON-schema object describing this tool's arguments.
    pub fn input_schema(&self) -> JsonObject {
        (self.schema)()
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(self.name, self.description, Arc::new(self.input_schema()))
    }
}

fn schema_of<I: ToolInput>() -> JsonObject {
    let schema = schemars::schema_for!(I);
    match serde_json::to_value(schema) {
        Ok(Value::Object(mut object)) => {
            object.remove("$schema");
            object
        }
        _ => JsonObject::new(),
    }
}

pub const LIST_FOLDERS: &str = "gdrive_list_folders";
pub const SEARCH: &str = "gdrive_search";
pub const READ_FILE: &str = "gdrive_read_file";
pub const CREATE_FOLDER: &str = "gdrive_create_folder";
pub const UPLOAD_FILE: &str = "gdrive_upload_file";
pub const DELETE_FILE: &str = "gdrive_delete_file";
pub const MOVE_FILE: &str = "gdrive_move_file";
pub const GET_FILE_METADATA: &str = "gdrive_get_file_metadata";
pub const LIST_RECENT: &str = "gdrive_list_recent";
pub const GET_FILE_INFO: &str = "gdrive_get_file_info";
pub const DOWNLOAD_FILE: &str = "gdrive_download_file";
pub const SHARE_FILE_PUBLIC: &str = "gdrive_share_file_public";

pub static TOOLS: &[ToolDefinition] = &[
    ToolDefinition::new::<NoInput>(LIST_FOLDERS, "List all folders in the user's Google Drive"),
    ToolDefinition::new::<SearchInput>(
        SEARCH,
        "Search for files specifically in your Google Drive account (don't use exa nor brave to search for files)",
    ),
    ToolDefinition::new::<FileIdInput>(
        READ_FILE,
        "Read a file from Google Drive using its Google Drive file ID (don't use exa nor brave to read files)",
    ),
    ToolDefinition::new::<CreateFolderInput>(
        CREATE_FOLDER,
        "Create a new folder in the user's Google Drive",
    ),
    ToolDefinition::new::<UploadFileInput>(
        UPLOAD_FILE,
        "Upload a new file (text or base64 data) to a specific folder in Google Drive",
    ),
    ToolDefinition::new::<FileIdInput>(
        DELETE_FILE,
        "Delete a file by its file ID from the user's Google Drive",
    ),
    ToolDefinition::new::<MoveFileInput>(
        MOVE_FILE,
        "Move a file to a different folder by updating its parent",
    ),
    ToolDefinition::new::<FileIdInput>(
        GET_FILE_METADATA,
        "Fetch metadata (name, mimeType, size, modifiedTime) for a file by its ID",
    ),
    ToolDefinition::new::<ListRecentInput>(
        LIST_RECENT,
        "List the most recently modified files in your Google Drive",
    ),
    ToolDefinition::new::<FileIdInput>(
        GET_FILE_INFO,
        "Get metadata (name, type, size, modified date) of a file by ID",
    ),
    ToolDefinition::new::<FileIdInput>(
        DOWNLOAD_FILE,
        "Download a file as base64 or buffer by ID",
    ),
    ToolDefinition::new::<FileIdInput>(
        SHARE_FILE_PUBLIC,
        "Make a file publicly accessible via link and return the shareable URL",
    ),
];

#[cfg(test)]
fn find(name: &str) -> Option<&'static ToolDefinition> {
    TOOLS.iter().find(|tool| tool.name == name)
}

/// Every published tool, in registry order.
pub fn tools() -> Vec<Tool> {
    TOOLS.iter().map(ToolDefinition::to_tool).collect()
}
