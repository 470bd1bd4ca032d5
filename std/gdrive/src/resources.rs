//! Resource catalog: Drive files exposed as `gdrive:///<file-id>` resources.

use crate::content::{ResolvedContent, resolve};
use crate::drive::{ListRequest, Query, StorageGateway};
use crate::error::{DriveError, Result};

pub const URI_SCHEME: &str = "gdrive:///";

/// Fixed page size for resource browsing.
pub const PAGE_SIZE: u32 = 10;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub mime_type: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePage {
    pub resources: Vec<ResourceDescriptor>,
    pub next_cursor: Option<String>,
}

pub fn resource_uri(file_id: &str) -> String {
    format!("{URI_SCHEME}{file_id}")
}

/// Recover the file id from a resource URI.
pub fn file_id_from_uri(uri: &str) -> Result<&str> {
    uri.strip_prefix(URI_SCHEME)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DriveError::UnsupportedUri(uri.to_string()))
}

/// List one page of non-trashed files. The cursor is passed through as-is.
pub async fn list_resources<G: StorageGateway>(
    gateway: &G,
    cursor: Option<String>,
) -> Result<ResourcePage> {
    let request = ListRequest::new(Query::new(), PAGE_SIZE, LIST_FIELDS).page_token(cursor);
    let list = gateway.list(&request).await?;
    Ok(ResourcePage {
        resources: list
            .files
            .into_iter()
            .map(|file| ResourceDescriptor {
                uri: resource_uri(&file.id),
                mime_type: file.mime_type,
                name: file.name,
            })
            .collect(),
        next_cursor: list.next_page_token,
    })
}

pub async fn read_resource<G: StorageGateway>(gateway: &G, uri: &str) -> Result<ResolvedContent> {
    let file_id = file_id_from_uri(uri)?;
    resolve(gateway, file_id).await
}

#[cfg(test)]
mod tests {
    use crate::error::DriveError;
    use crate::resources::{file_id_from_uri, list_resources, read_resource, resource_uri};
    use crate::testing::{Call, FakeDrive};
    use std::collections::HashSet;

    #[test]
    fn uri_round_trips_id_verbatim() {
        let uri = resource_uri("1AbC-_xyz");
        assert_eq!(uri, "gdrive:///1AbC-_xyz");
        assert_eq!(file_id_from_uri(&uri).expect("valid"), "1AbC-_xyz");
    }

    #[test]
    fn rejects_foreign_uris() {
        for uri in ["file:///etc/passwd", "gdrive://abc", "gdrive:///"] {
            assert!(matches!(
                file_id_from_uri(uri),
                Err(DriveError::UnsupportedUri(_))
            ));
        }
    }

    #[tokio::test]
    async fn pages_through_all_files() {
        let drive = FakeDrive::new();
        for i in 0..23 {
            drive.insert_file(&format!("id{i}"), &format!("file{i}"), "text/plain", b"x");
        }

        let first = list_resources(&drive, None).await.expect("first page");
        assert_eq!(first.resources.len(), 10);
        let cursor = first.next_cursor.clone().expect("more pages");
        assert!(!cursor.is_empty());

        let second = list_resources(&drive, Some(cursor.clone()))
            .await
            .expect("second page");
        assert_eq!(second.resources.len(), 10);

        let third = list_resources(&drive, second.next_cursor.clone())
            .await
            .expect("third page");
        assert_eq!(third.resources.len(), 3);
        assert!(third.next_cursor.is_none());

        let uris: HashSet<_> = first
            .resources
            .iter()
            .chain(&second.resources)
            .chain(&third.resources)
            .map(|r| r.uri.clone())
            .collect();
        assert_eq!(uris.len(), 23);

        let calls = drive.calls();
        assert_eq!(
            calls[1],
            Call::List {
                query: "trashed = false".into(),
                page_size: 10,
                page_token: Some(cursor),
                order_by: None,
            }
        );
    }

    #[tokio::test]
    async fn reads_resource_through_resolver() {
        let drive = FakeDrive::new();
        drive.insert_file(
            "s1",
            "Budget",
            "application/vnd.google-apps.spreadsheet",
            b"a,b\n1,2\n",
        );

        let content = read_resource(&drive, "gdrive:///s1").await.expect("read");
        assert_eq!(content.mime_type, "text/csv");
        assert_eq!(content.content, "a,b\n1,2\n");
    }
}
