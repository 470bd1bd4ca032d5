//! Storage gateway contract for Google Drive.
//!
//! [`StorageGateway`] is the only seam between the MCP layer and the Drive
//! API. Every method is a stateless round trip; nothing is cached, so two
//! reads of the same file may observe different server states.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Media type of Drive folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// File metadata as returned by Drive v3.
///
/// Drive only returns the fields requested in the `fields` projection, so
/// everything except `parents` is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes. Drive encodes int64 values as strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// One page of a `files.list` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    /// Opaque continuation token. Absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata for a file or folder being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Upload body for a created file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// Literal text, uploaded as its UTF-8 bytes.
    Text { mime_type: String, text: String },
    /// Already-decoded binary content.
    Binary { mime_type: String, bytes: Vec<u8> },
}

impl Media {
    pub fn mime_type(&self) -> &str {
        match self {
            Media::Text { mime_type, .. } | Media::Binary { mime_type, .. } => mime_type,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Media::Text { text, .. } => text.as_bytes(),
            Media::Binary { bytes, .. } => bytes,
        }
    }
}

/// Escape a value for use inside a single-quoted query literal.
///
/// Backslashes are escaped first so the backslash introduced for `'` is not
/// doubled.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A Drive search expression.
///
/// Clauses are joined with `and`; `trashed = false` is always appended last,
/// so trashed files can never be listed through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match files whose name contains `needle`.
    pub fn name_contains(mut self, needle: &str) -> Self {
        self.clauses
            .push(format!("name contains '{}'", escape_literal(needle)));
        self
    }

    /// Restrict to direct children of `folder_id`.
    pub fn in_parent(mut self, folder_id: &str) -> Self {
        self.clauses
            .push(format!("'{}' in parents", escape_literal(folder_id)));
        self
    }

    /// Restrict to an exact media type.
    pub fn mime_type(mut self, mime_type: &str) -> Self {
        self.clauses
            .push(format!("mimeType = '{}'", escape_literal(mime_type)));
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            write!(f, "{clause} and ")?;
        }
        f.write_str("trashed = false")
    }
}

/// Parameters of a `files.list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: Query,
    pub page_size: u32,
    /// Forwarded verbatim from a previous [`FileList::next_page_token`].
    pub page_token: Option<String>,
    pub order_by: Option<&'static str>,
    pub fields: &'static str,
}

impl ListRequest {
    pub fn new(query: Query, page_size: u32, fields: &'static str) -> Self {
        Self {
            query,
            page_size,
            page_token: None,
            order_by: None,
            fields,
        }
    }

    pub fn page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }

    pub fn order_by(mut self, order_by: &'static str) -> Self {
        self.order_by = Some(order_by);
        self
    }
}

/// Remote storage operations used by the server.
///
/// Implementations propagate failures untouched: no retries, no
/// interpretation beyond decoding the provider's error body.
pub trait StorageGateway: Send + Sync + 'static {
    /// List non-trashed files matching `request`.
    fn list(&self, request: &ListRequest) -> impl Future<Output = Result<FileList>> + Send;

    /// Fetch metadata projected to `fields`.
    fn get(&self, file_id: &str, fields: &str) -> impl Future<Output = Result<DriveFile>> + Send;

    /// Export a Google Workspace document to `mime_type`.
    fn export(&self, file_id: &str, mime_type: &str)
    -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Download the raw bytes of a regular file.
    fn download(&self, file_id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Create a folder (no media) or a file (with media).
    fn create(
        &self,
        file: &NewFile,
        media: Option<&Media>,
        fields: &str,
    ) -> impl Future<Output = Result<DriveFile>> + Send;

    /// Add `add_parent` and remove every id in `remove_parents` in one update.
    fn reparent(
        &self,
        file_id: &str,
        add_parent: &str,
        remove_parents: &[String],
        fields: &str,
    ) -> impl Future<Output = Result<DriveFile>> + Send;

    fn delete(&self, file_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Grant anyone-with-link read access.
    fn share_public(&self, file_id: &str) -> impl Future<Output = Result<()>> + Send;
}
