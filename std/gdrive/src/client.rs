//! Drive v3 REST client implementing [`StorageGateway`].

use crate::auth::Session;
use crate::drive::{DriveFile, FileList, ListRequest, Media, NewFile, StorageGateway};
use crate::error::{DriveError, Result};
use reqwest::{RequestBuilder, Response, Url, header};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const MULTIPART_BOUNDARY: &str = "wmcp_gdrive_multipart_boundary";

/// Authenticated Drive client bound to one session for its whole lifetime.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: Url,
    upload_base: Url,
    session: Session,
}

fn parse_base(url: &str) -> Result<Url> {
    let invalid = |reason: String| DriveError::InvalidBaseUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".into()));
    }
    Ok(parsed)
}

/// Append `segments` to `base`, percent-encoding each one.
///
/// Ids are tool input, so `/`, `?` and `#` inside them are encoded rather
/// than interpreted, and dot segments are refused outright.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    if let Some(bad) = segments
        .iter()
        .find(|s| matches!(**s, "" | "." | ".."))
    {
        return Err(DriveError::InvalidFileId((*bad).to_string()));
    }
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| DriveError::InvalidBaseUrl {
            url: base.to_string(),
            reason: "not a hierarchical URL".into(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl DriveClient {
    pub fn new(session: Session) -> Result<Self> {
        Self::with_api_base(session, DEFAULT_API_BASE)
    }

    /// Point the client at another Drive-compatible endpoint.
    ///
    /// The upload endpoint is derived from it: `.../drive/v3` becomes
    /// `.../upload/drive/v3`, any other base gets an `/upload` suffix.
    pub fn with_api_base(session: Session, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim().trim_end_matches('/');
        let upload_base = match api_base.strip_suffix("/drive/v3") {
            Some(root) => format!("{root}/upload/drive/v3"),
            None => format!("{api_base}/upload"),
        };
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: parse_base(api_base)?,
            upload_base: parse_base(&upload_base)?,
            session,
        })
    }

    /// `<api base>/files[/<file_id>[/<suffix>]]`
    fn files_url(&self, file_id: Option<&str>, suffix: Option<&str>) -> Result<Url> {
        let segments: Vec<&str> = std::iter::once("files")
            .chain(file_id)
            .chain(suffix)
            .collect();
        endpoint(&self.api_base, &segments)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(self.session.access_token())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, %body, "drive request failed");
        Err(DriveError::from_response(status.as_u16(), &body))
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<DriveFile> {
        let response = self.send(request).await?;
        Ok(response.json::<DriveFile>().await?)
    }

    async fn send_bytes(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = self.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_body(file: &NewFile, media: &Media) -> Result<Vec<u8>> {
    let metadata = serde_json::to_vec(file)?;
    let mut body = Vec::with_capacity(metadata.len() + media.as_bytes().len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&metadata);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media.mime_type()).as_bytes());
    body.extend_from_slice(media.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--").as_bytes());
    Ok(body)
}

impl StorageGateway for DriveClient {
    async fn list(&self, request: &ListRequest) -> Result<FileList> {
        let mut query = vec![
            ("q", request.query.to_string()),
            ("pageSize", request.page_size.to_string()),
            ("fields", request.fields.to_string()),
        ];
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        if let Some(order_by) = request.order_by {
            query.push(("orderBy", order_by.to_string()));
        }
        let response = self
            .send(self.http.get(self.files_url(None, None)?).query(&query))
            .await?;
        Ok(response.json::<FileList>().await?)
    }

    async fn get(&self, file_id: &str, fields: &str) -> Result<DriveFile> {
        self.send_json(
            self.http
                .get(self.files_url(Some(file_id), None)?)
                .query(&[("fields", fields)]),
        )
        .await
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
        self.send_bytes(
            self.http
                .get(self.files_url(Some(file_id), Some("export"))?)
                .query(&[("mimeType", mime_type)]),
        )
        .await
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.send_bytes(
            self.http
                .get(self.files_url(Some(file_id), None)?)
                .query(&[("alt", "media")]),
        )
        .await
    }

    async fn create(&self, file: &NewFile, media: Option<&Media>, fields: &str) -> Result<DriveFile> {
        let request = match media {
            None => self
                .http
                .post(self.files_url(None, None)?)
                .query(&[("fields", fields)])
                .json(file),
            Some(media) => self
                .http
                .post(endpoint(&self.upload_base, &["files"])?)
                .query(&[("uploadType", "multipart"), ("fields", fields)])
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(multipart_body(file, media)?),
        };
        self.send_json(request).await
    }

    async fn reparent(
        &self,
        file_id: &str,
        add_parent: &str,
        remove_parents: &[String],
        fields: &str,
    ) -> Result<DriveFile> {
        let remove = remove_parents.join(",");
        self.send_json(
            self.http
                .patch(self.files_url(Some(file_id), None)?)
                .query(&[
                    ("addParents", add_parent),
                    ("removeParents", remove.as_str()),
                    ("fields", fields),
                ])
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.send(self.http.delete(self.files_url(Some(file_id), None)?))
            .await?;
        Ok(())
    }

    async fn share_public(&self, file_id: &str) -> Result<()> {
        self.send(
            self.http
                .post(self.files_url(Some(file_id), Some("permissions"))?)
                .json(&serde_json::json!({ "role": "reader", "type": "anyone" })),
        )
        .await?;
        Ok(())
    }
}
