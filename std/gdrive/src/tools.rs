//! Tool dispatch for the Drive MCP server.
//!
//! Each invocation goes through three steps:
//!
//! 1. **Validate**: decode the argument object into the tool's input struct
//!    and check required identifiers. A missing identifier is a protocol
//!    fault (`invalid_params`), as is an unknown tool name
//!    (`method_not_found`). Optional arguments of the wrong type are ignored.
//! 2. **Execute**: call the storage gateway and/or content resolver.
//! 3. **Format**: render a single text block. Remote failures become error
//!    envelopes instead of faults.

use crate::content::{self, is_text_mime_type};
use crate::drive::{DriveFile, FOLDER_MIME_TYPE, ListRequest, Media, NewFile, Query, StorageGateway};
use crate::error::Result;
use crate::registry;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode, JsonObject};
use rmcp::schemars::{self, JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

const SEARCH_PAGE_SIZE: u32 = 10;
const FOLDER_PAGE_SIZE: u32 = 50;
const DEFAULT_RECENT_COUNT: f64 = 10.0;
const MAX_RECENT_COUNT: f64 = 20.0;
const METADATA_FIELDS: &str =
    "id, name, mimeType, size, modifiedTime, createdTime, webViewLink, parents";

/// Tool arguments after decoding, before execution.
///
/// The derived schema is what `tools/list` publishes. Only the required
/// identifiers are enforced; everything else in the schema is advisory.
pub trait ToolInput: DeserializeOwned + JsonSchema {
    /// Reject missing required identifiers.
    fn check(&self) -> Result<(), ErrorData> {
        Ok(())
    }
}

fn require(value: &Option<String>, message: &'static str) -> Result<(), ErrorData> {
    if value.as_deref().is_none_or(str::is_empty) {
        return Err(ErrorData::invalid_params(message, None));
    }
    Ok(())
}

/// Value of an identifier that `check` has already accepted.
fn id(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

/// Decode an optional argument, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn recent_count_schema(_generator: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "number",
        "description": "How many recent files to list (max 20)",
        "minimum": 1,
        "maximum": 20,
        "default": 10
    })
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoInput {}

impl ToolInput for NoInput {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Search query
    pub query: String,
    /// ID of the parent folder to search within
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<String>")]
    pub parent_folder_id: Option<String>,
}

impl ToolInput for SearchInput {}

/// Input for every tool addressed by a single file id.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(extend("required" = ["file_id"]))]
pub struct FileIdInput {
    /// ID of the file
    #[schemars(with = "String")]
    pub file_id: Option<String>,
}

impl ToolInput for FileIdInput {
    fn check(&self) -> Result<(), ErrorData> {
        require(&self.file_id, "File ID is required")
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(extend("required" = ["name"]))]
pub struct CreateFolderInput {
    /// Name of the folder to create
    #[schemars(with = "String", length(min = 1), regex(pattern = r"^[^\\/]*$"))]
    pub name: Option<String>,
    /// ID of the parent folder
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<String>", extend("default" = "root"))]
    pub parent_folder_id: Option<String>,
}

impl ToolInput for CreateFolderInput {
    fn check(&self) -> Result<(), ErrorData> {
        require(&self.name, "Folder name is required")
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(extend(
    "required" = ["folder_id", "filename", "mimeType", "content"],
    "allOf" = [{
        "if": { "properties": { "mimeType": { "const": "application/octet-stream" } } },
        "then": { "properties": { "content": { "contentEncoding": "base64" } } }
    }]
))]
pub struct UploadFileInput {
    /// ID of the folder to upload to
    #[schemars(with = "String")]
    pub folder_id: Option<String>,
    /// Name of the file to create
    #[schemars(with = "String")]
    pub filename: Option<String>,
    /// MIME type of the file
    #[serde(rename = "mimeType")]
    #[schemars(
        with = "String",
        extend("examples" = ["text/plain", "application/json", "text/markdown"])
    )]
    pub mime_type: Option<String>,
    /// Content of the file (base64 or plain text)
    #[schemars(with = "String")]
    pub content: Option<String>,
}

impl ToolInput for UploadFileInput {
    fn check(&self) -> Result<(), ErrorData> {
        let fields = [&self.folder_id, &self.filename, &self.mime_type, &self.content];
        if fields.iter().any(|f| f.as_deref().is_none_or(str::is_empty)) {
            return Err(ErrorData::invalid_params("Missing required parameters", None));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(extend("required" = ["file_id", "folder_id"]))]
pub struct MoveFileInput {
    /// ID of the file to move
    #[schemars(with = "String")]
    pub file_id: Option<String>,
    /// ID of the destination folder
    #[schemars(with = "String")]
    pub folder_id: Option<String>,
}

impl ToolInput for MoveFileInput {
    fn check(&self) -> Result<(), ErrorData> {
        let ids = [&self.file_id, &self.folder_id];
        if ids.iter().any(|f| f.as_deref().is_none_or(str::is_empty)) {
            return Err(ErrorData::invalid_params(
                "File ID and Folder ID are required",
                None,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListRecentInput {
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(schema_with = "recent_count_schema")]
    pub count: Option<f64>,
    /// ID of the folder to list recent files from
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<String>")]
    pub folder_id: Option<String>,
}

impl ToolInput for ListRecentInput {}

fn parse<I: ToolInput>(arguments: JsonObject) -> Result<I, ErrorData> {
    let input: I = serde_json::from_value(serde_json::Value::Object(arguments))
        .map_err(|e| ErrorData::invalid_params(e.to_string(), None))?;
    input.check()?;
    Ok(input)
}

/// Turn an execution outcome into the response envelope.
fn envelope(tool: &str, context: &str, outcome: Result<String>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            tracing::warn!(tool, error = %e, "drive call failed");
            e.envelope(context)
        }
    }
}

type Handler<G> = for<'a> fn(&'a G, JsonObject) -> BoxFuture<'a, Result<CallToolResult, ErrorData>>;

/// Adapt `handler` into a table entry: parse, execute, wrap.
macro_rules! route {
    ($tool:expr, $handler:ident, $context:literal) => {{
        fn adapter<G: StorageGateway>(
            gateway: &G,
            arguments: JsonObject,
        ) -> BoxFuture<'_, Result<CallToolResult, ErrorData>> {
            Box::pin(async move {
                let input = parse(arguments)?;
                Ok::<_, ErrorData>(envelope($tool, $context, $handler(gateway, input).await))
            })
        }
        ($tool, adapter::<G> as Handler<G>)
    }};
}

/// Name → handler table for every registered tool.
pub struct Dispatcher<G> {
    routes: HashMap<&'static str, Handler<G>>,
}

impl<G: StorageGateway> Dispatcher<G> {
    pub fn new() -> Self {
        let routes = HashMap::from([
            route!(registry::LIST_FOLDERS, list_folders, "Error listing folders"),
            route!(registry::SEARCH, search, "Search failed"),
            route!(registry::READ_FILE, read_file, "Error reading file"),
            route!(registry::CREATE_FOLDER, create_folder, "Error creating folder"),
            route!(registry::UPLOAD_FILE, upload_file, "Error uploading file"),
            route!(registry::DELETE_FILE, delete_file, "Error deleting file"),
            route!(registry::MOVE_FILE, move_file, "Error moving file"),
            route!(registry::GET_FILE_METADATA, get_file_metadata, "Error getting file metadata"),
            route!(registry::LIST_RECENT, list_recent, "Error listing recent files"),
            route!(registry::GET_FILE_INFO, get_file_info, "Error getting file info"),
            route!(registry::DOWNLOAD_FILE, download_file, "Error downloading file"),
            route!(registry::SHARE_FILE_PUBLIC, share_file_public, "Error sharing file"),
        ]);
        Self { routes }
    }

    #[cfg(test)]
    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    /// Run one tool call.
    ///
    /// `Err` is reserved for protocol faults; remote failures come back as
    /// `Ok` with `is_error` set.
    pub async fn invoke(
        &self,
        gateway: &G,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(handler) = self.routes.get(name) else {
            return Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Tool '{name}' not found"),
                None,
            ));
        };
        tracing::debug!(tool = name, "dispatching tool call");
        handler(gateway, arguments.unwrap_or_default()).await
    }
}

impl<G: StorageGateway> Default for Dispatcher<G> {
    fn default() -> Self {
        Self::new()
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn file_line(file: &DriveFile) -> String {
    format!(
        "{} ({}) - ID: {} (Modified: {})",
        file.name,
        or_na(file.mime_type.as_deref()),
        file.id,
        or_na(file.modified_time.as_deref())
    )
}

fn metadata_summary(title: &str, file: &DriveFile) -> String {
    let parents = if file.parents.is_empty() {
        "None".to_string()
    } else {
        file.parents.join(", ")
    };
    format!(
        "{title}:\nName: {}\nID: {}\nMIME Type: {}\nSize: {} bytes\nModified: {}\nCreated: {}\nLink: {}\nParent Folder IDs: {parents}",
        file.name,
        file.id,
        or_na(file.mime_type.as_deref()),
        or_na(file.size.as_deref()),
        or_na(file.modified_time.as_deref()),
        or_na(file.created_time.as_deref()),
        or_na(file.web_view_link.as_deref()),
    )
}

/// Clamp a requested count to `1..=20`, defaulting to 10. Fractions truncate.
pub fn clamp_count(count: Option<f64>) -> u32 {
    let count = count
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_RECENT_COUNT);
    count.clamp(1.0, MAX_RECENT_COUNT) as u32
}

/// Choose the upload body from the declared type.
pub fn upload_media(mime_type: &str, content: &str) -> Result<Media> {
    if is_text_mime_type(mime_type) {
        return Ok(Media::Text {
            mime_type: mime_type.to_string(),
            text: content.to_string(),
        });
    }
    Ok(Media::Binary {
        mime_type: mime_type.to_string(),
        bytes: STANDARD.decode(content.trim())?,
    })
}

async fn list_folders<G: StorageGateway>(gateway: &G, _input: NoInput) -> Result<String> {
    let request = ListRequest::new(
        Query::new().mime_type(FOLDER_MIME_TYPE),
        FOLDER_PAGE_SIZE,
        "files(id, name, createdTime)",
    );
    let list = gateway.list(&request).await?;
    let lines: Vec<String> = list
        .files
        .iter()
        .map(|f| {
            format!(
                "{} - ID: {} (Created: {})",
                f.name,
                f.id,
                or_na(f.created_time.as_deref())
            )
        })
        .collect();
    let body = if lines.is_empty() {
        "No folders found".to_string()
    } else {
        lines.join("\n")
    };
    Ok(format!("Found {} folders:\n{body}", list.files.len()))
}

async fn search<G: StorageGateway>(gateway: &G, input: SearchInput) -> Result<String> {
    let mut query = Query::new().name_contains(&input.query);
    if let Some(parent) = input.parent_folder_id.as_deref().filter(|p| !p.is_empty()) {
        query = query.in_parent(parent);
    }
    let request = ListRequest::new(
        query,
        SEARCH_PAGE_SIZE,
        "files(id, name, mimeType, modifiedTime, size, parents)",
    );
    let list = gateway.list(&request).await?;
    let lines: Vec<String> = list.files.iter().map(file_line).collect();
    let body = if lines.is_empty() {
        "No files found".to_string()
    } else {
        lines.join("\n")
    };
    Ok(format!("Found {} files:\n{body}", list.files.len()))
}

async fn read_file<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    Ok(content::resolve(gateway, id(&input.file_id)).await?.content)
}

async fn create_folder<G: StorageGateway>(gateway: &G, input: CreateFolderInput) -> Result<String> {
    let parent = input
        .parent_folder_id
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "root".to_string());
    let folder = NewFile {
        name: id(&input.name).to_string(),
        mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        parents: vec![parent],
    };
    let created = gateway
        .create(&folder, None, "id, name, webViewLink")
        .await?;
    Ok(format!(
        "Folder created successfully:\nName: {}\nID: {}\nLink: {}",
        created.name,
        created.id,
        or_na(created.web_view_link.as_deref())
    ))
}

async fn upload_file<G: StorageGateway>(gateway: &G, input: UploadFileInput) -> Result<String> {
    let media = upload_media(id(&input.mime_type), id(&input.content))?;
    let file = NewFile {
        name: id(&input.filename).to_string(),
        mime_type: None,
        parents: vec![id(&input.folder_id).to_string()],
    };
    let created = gateway
        .create(&file, Some(&media), "id, name, webViewLink, size")
        .await?;
    Ok(format!(
        "File uploaded successfully:\nName: {}\nID: {}\nSize: {} bytes\nLink: {}",
        created.name,
        created.id,
        or_na(created.size.as_deref()),
        or_na(created.web_view_link.as_deref())
    ))
}

async fn delete_file<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    gateway.delete(id(&input.file_id)).await?;
    Ok(format!(
        "File with ID {} has been deleted successfully.",
        id(&input.file_id)
    ))
}

async fn move_file<G: StorageGateway>(gateway: &G, input: MoveFileInput) -> Result<String> {
    let current = gateway.get(id(&input.file_id), "parents").await?;
    let moved = gateway
        .reparent(
            id(&input.file_id),
            id(&input.folder_id),
            &current.parents,
            "id, name, parents",
        )
        .await?;
    Ok(format!(
        "File moved successfully:\nName: {}\nID: {}\nNew parent folder: {}",
        moved.name,
        moved.id,
        id(&input.folder_id)
    ))
}

async fn get_file_metadata<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    let file = gateway.get(id(&input.file_id), METADATA_FIELDS).await?;
    Ok(metadata_summary("File Metadata", &file))
}

async fn get_file_info<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    let file = gateway.get(id(&input.file_id), METADATA_FIELDS).await?;
    Ok(metadata_summary("File Info", &file))
}

async fn list_recent<G: StorageGateway>(gateway: &G, input: ListRecentInput) -> Result<String> {
    let mut query = Query::new();
    if let Some(folder) = input.folder_id.as_deref().filter(|f| !f.is_empty()) {
        query = query.in_parent(folder);
    }
    let request = ListRequest::new(
        query,
        clamp_count(input.count),
        "files(id, name, mimeType, modifiedTime)",
    )
    .order_by("modifiedTime desc");
    let list = gateway.list(&request).await?;
    let lines: Vec<String> = list.files.iter().map(file_line).collect();
    let body = if lines.is_empty() {
        "No recent files found".to_string()
    } else {
        lines.join("\n")
    };
    Ok(format!("Found {} recent files:\n{body}", list.files.len()))
}

async fn download_file<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    let resolved = content::resolve(gateway, id(&input.file_id)).await?;
    Ok(format!(
        "File downloaded successfully:\nMIME Type: {}\nEncoding: {}\n\n{}",
        resolved.mime_type,
        resolved.encoding.label(),
        resolved.content
    ))
}

async fn share_file_public<G: StorageGateway>(gateway: &G, input: FileIdInput) -> Result<String> {
    gateway.share_public(id(&input.file_id)).await?;
    let file = gateway
        .get(id(&input.file_id), "webViewLink, webContentLink, name")
        .await?;
    let link = file
        .web_content_link
        .as_deref()
        .or(file.web_view_link.as_deref());
    Ok(format!(
        "File \"{}\" is now publicly accessible:\nShareable Link: {}",
        file.name,
        or_na(link)
    ))
}
