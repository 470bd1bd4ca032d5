//! MCP server exposing a Google Drive account.
//!
//! Files are published as `gdrive:///<file-id>` resources, and twelve
//! `gdrive_*` tools cover search, reads, uploads, and file management.
//! Google-native documents are exported to portable formats on read.

pub mod auth;
pub mod client;
pub mod content;
pub mod drive;
pub mod error;
pub mod registry;
pub mod resources;
pub mod tools;

#[cfg(test)]
mod testing;

use crate::drive::StorageGateway;
use crate::error::DriveError;
use crate::resources::ResourcePage;
use crate::tools::Dispatcher;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParams, CallToolResult, Implementation, ListResourcesResult,
        ListToolsResult, PaginatedRequestParams, RawResource, ReadResourceRequestParams,
        ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};

/// Drive MCP server over any [`StorageGateway`].
pub struct GdriveServer<G> {
    gateway: G,
    dispatcher: Dispatcher<G>,
}

impl<G: StorageGateway> GdriveServer<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            dispatcher: Dispatcher::new(),
        }
    }

    #[cfg(test)]
    fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn resource_page(&self, cursor: Option<String>) -> Result<ListResourcesResult, ErrorData> {
        let ResourcePage {
            resources,
            next_cursor,
        } = resources::list_resources(&self.gateway, cursor)
            .await
            .map_err(resource_fault)?;
        let resources = resources
            .into_iter()
            .map(|descriptor| {
                let mut raw = RawResource::new(descriptor.uri, descriptor.name);
                raw.mime_type = descriptor.mime_type;
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult {
            meta: None,
            next_cursor,
            resources,
        })
    }

    async fn resource_contents(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        let resolved = resources::read_resource(&self.gateway, uri)
            .await
            .map_err(resource_fault)?;
        let mut contents = ResourceContents::text(resolved.content, uri);
        if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
            *mime_type = Some(resolved.mime_type);
        }
        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }
}

/// Resource failures are protocol faults, unlike tool failures.
fn resource_fault(e: DriveError) -> ErrorData {
    tracing::warn!(error = %e, "resource request failed");
    match e {
        DriveError::UnsupportedUri(_) => ErrorData::invalid_params(e.to_string(), None),
        e if e.is_not_found() => ErrorData::resource_not_found(e.describe(), None),
        e => ErrorData::internal_error(e.describe(), None),
    }
}

impl<G: StorageGateway> ServerHandler for GdriveServer<G> {
    async fn list_resources(
        &self,
        request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        self.resource_page(request.and_then(|r| r.cursor)).await
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        self.resource_contents(&request.uri).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: registry::tools(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatcher
            .invoke(&self.gateway, &request.name, request.arguments)
            .await
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "wmcp-gdrive".into(),
                title: Some("Walrus MCP Google Drive Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Google Drive server. Files are readable as gdrive:/// resources; \
                 use the gdrive_* tools to search, read, upload, and organize them."
                    .into(),
            ),
        }
    }
}
