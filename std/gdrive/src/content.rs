//! Content resolution: turn any Drive file into a typed text payload.
//!
//! Google Workspace documents have no byte representation and are exported
//! to a fixed concrete type per kind. Everything else is downloaded as-is.
//! Either way the payload is UTF-8 text for text-family types and base64
//! for everything else, decided by the media type alone.

use crate::drive::StorageGateway;
use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Fallback type for files that declare none.
pub const OCTET_STREAM: &str = "application/octet-stream";

const JSON: &str = "application/json";
const WORKSPACE_PREFIX: &str = "application/vnd.google-apps";

/// Kind of a Google Workspace (virtual) document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Document,
    Spreadsheet,
    Presentation,
    Drawing,
    /// Any other Workspace type (forms, sites, folders, ...).
    Other,
}

impl DocumentKind {
    /// Classify a media type; `None` for regular files.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        if !mime_type.starts_with(WORKSPACE_PREFIX) {
            return None;
        }
        Some(match mime_type {
            "application/vnd.google-apps.document" => DocumentKind::Document,
            "application/vnd.google-apps.spreadsheet" => DocumentKind::Spreadsheet,
            "application/vnd.google-apps.presentation" => DocumentKind::Presentation,
            "application/vnd.google-apps.drawing" => DocumentKind::Drawing,
            _ => DocumentKind::Other,
        })
    }

    /// Target type passed to `files.export`.
    pub fn export_mime_type(self) -> &'static str {
        match self {
            DocumentKind::Document => "text/markdown",
            DocumentKind::Spreadsheet => "text/csv",
            DocumentKind::Presentation => "text/plain",
            DocumentKind::Drawing => "image/png",
            DocumentKind::Other => "text/plain",
        }
    }
}

/// `text/*` and JSON are text; everything else is binary.
pub fn is_text_mime_type(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || mime_type == JSON
}

/// Payload encoding of resolved content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Base64,
}

impl Encoding {
    pub fn for_mime_type(mime_type: &str) -> Self {
        if is_text_mime_type(mime_type) {
            Encoding::Utf8
        } else {
            Encoding::Base64
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Base64 => "base64",
        }
    }

    /// Render bytes in this encoding. Invalid UTF-8 is replaced, not rejected.
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Base64 => STANDARD.encode(bytes),
        }
    }
}

/// Materialized file content. `mime_type` is never a Workspace type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub mime_type: String,
    pub encoding: Encoding,
    pub content: String,
}

impl ResolvedContent {
    pub fn new(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        let encoding = Encoding::for_mime_type(&mime_type);
        Self {
            content: encoding.encode(bytes),
            mime_type,
            encoding,
        }
    }
}

/// Fetch and encode the current content of `file_id`.
pub async fn resolve<G: StorageGateway>(gateway: &G, file_id: &str) -> Result<ResolvedContent> {
    let file = gateway.get(file_id, "mimeType").await?;
    let mime_type = file.mime_type.filter(|m| !m.is_empty());

    if let Some(kind) = mime_type.as_deref().and_then(DocumentKind::from_mime_type) {
        let target = kind.export_mime_type();
        let bytes = gateway.export(file_id, target).await?;
        return Ok(ResolvedContent::new(target, &bytes));
    }

    let bytes = gateway.download(file_id).await?;
    let mime_type = mime_type.unwrap_or_else(|| OCTET_STREAM.to_string());
    Ok(ResolvedContent::new(mime_type, &bytes))
}
