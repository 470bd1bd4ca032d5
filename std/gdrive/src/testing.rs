//! In-memory [`StorageGateway`] that records every call.

use crate::drive::{DriveFile, FileList, ListRequest, Media, NewFile, StorageGateway};
use crate::error::{DriveError, Result};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        query: String,
        page_size: u32,
        page_token: Option<String>,
        order_by: Option<String>,
    },
    Get {
        file_id: String,
        fields: String,
    },
    Export {
        file_id: String,
        mime_type: String,
    },
    Download {
        file_id: String,
    },
    Create {
        file: NewFile,
        media: Option<Media>,
    },
    Reparent {
        file_id: String,
        add_parent: String,
        remove_parents: Vec<String>,
    },
    Delete {
        file_id: String,
    },
    SharePublic {
        file_id: String,
    },
}

#[derive(Default)]
pub struct FakeDrive {
    files: Mutex<Vec<(DriveFile, Vec<u8>)>>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<(u16, String)>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: DriveFile, content: &[u8]) {
        self.files
            .lock()
            .expect("files lock")
            .push((file, content.to_vec()));
    }

    pub fn insert_file(&self, id: &str, name: &str, mime_type: &str, content: &[u8]) {
        self.insert(
            DriveFile {
                id: id.into(),
                name: name.into(),
                mime_type: (!mime_type.is_empty()).then(|| mime_type.to_string()),
                size: Some(content.len().to_string()),
                created_time: Some("2024-01-01T00:00:00.000Z".into()),
                modified_time: Some("2024-01-02T00:00:00.000Z".into()),
                web_view_link: Some(format!("https://drive.google.com/file/d/{id}/view")),
                ..Default::default()
            },
            content,
        );
    }

    /// Make every subsequent call fail with this API error.
    pub fn fail_with(&self, code: u16, message: &str) {
        *self.failure.lock().expect("failure lock") = Some((code, message.into()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().expect("calls lock").push(call);
        match &*self.failure.lock().expect("failure lock") {
            Some((code, message)) => Err(DriveError::Api {
                code: Some(*code),
                message: message.clone(),
                errors: Vec::new(),
            }),
            None => Ok(()),
        }
    }

    fn find(&self, file_id: &str) -> Result<(DriveFile, Vec<u8>)> {
        self.files
            .lock()
            .expect("files lock")
            .iter()
            .find(|(f, _)| f.id == file_id)
            .cloned()
            .ok_or_else(|| not_found(file_id))
    }

    fn update(&self, file_id: &str, apply: impl FnOnce(&mut DriveFile)) -> Result<DriveFile> {
        let mut files = self.files.lock().expect("files lock");
        let (file, _) = files
            .iter_mut()
            .find(|(f, _)| f.id == file_id)
            .ok_or_else(|| not_found(file_id))?;
        apply(file);
        Ok(file.clone())
    }
}

fn not_found(file_id: &str) -> DriveError {
    DriveError::Api {
        code: Some(404),
        message: format!("File not found: {file_id}."),
        errors: Vec::new(),
    }
}

/// Honor the `mimeType = '..'` and `'..' in parents` clauses of a query.
/// Other clauses match everything.
fn matches_query(file: &DriveFile, query: &str) -> bool {
    query.split(" and ").all(|clause| {
        if let Some(mime) = clause
            .strip_prefix("mimeType = '")
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return file.mime_type.as_deref() == Some(mime);
        }
        if let Some(parent) = clause
            .strip_suffix("' in parents")
            .and_then(|rest| rest.strip_prefix('\''))
        {
            return file.parents.iter().any(|p| p == parent);
        }
        true
    })
}

impl StorageGateway for FakeDrive {
    async fn list(&self, request: &ListRequest) -> Result<FileList> {
        self.record(Call::List {
            query: request.query.to_string(),
            page_size: request.page_size,
            page_token: request.page_token.clone(),
            order_by: request.order_by.map(str::to_string),
        })?;
        let query = request.query.to_string();
        let files: Vec<DriveFile> = self
            .files
            .lock()
            .expect("files lock")
            .iter()
            .map(|(f, _)| f)
            .filter(|f| matches_query(f, &query))
            .cloned()
            .collect();
        let offset: usize = request
            .page_token
            .as_deref()
            .and_then(|t| t.strip_prefix("offset-"))
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let end = (offset + request.page_size as usize).min(files.len());
        let page = files.get(offset..end).unwrap_or_default().to_vec();
        Ok(FileList {
            files: page,
            next_page_token: (end < files.len()).then(|| format!("offset-{end}")),
        })
    }

    async fn get(&self, file_id: &str, fields: &str) -> Result<DriveFile> {
        self.record(Call::Get {
            file_id: file_id.into(),
            fields: fields.into(),
        })?;
        self.find(file_id).map(|(f, _)| f)
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
        self.record(Call::Export {
            file_id: file_id.into(),
            mime_type: mime_type.into(),
        })?;
        self.find(file_id).map(|(_, c)| c)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.record(Call::Download {
            file_id: file_id.into(),
        })?;
        self.find(file_id).map(|(_, c)| c)
    }

    async fn create(&self, file: &NewFile, media: Option<&Media>, _fields: &str) -> Result<DriveFile> {
        self.record(Call::Create {
            file: file.clone(),
            media: media.cloned(),
        })?;
        let id = format!("new-{}", self.files.lock().expect("files lock").len() + 1);
        let content = media.map(|m| m.as_bytes().to_vec()).unwrap_or_default();
        let created = DriveFile {
            id: id.clone(),
            name: file.name.clone(),
            mime_type: file
                .mime_type
                .clone()
                .or_else(|| media.map(|m| m.mime_type().to_string())),
            size: media.map(|_| content.len().to_string()),
            web_view_link: Some(format!("https://drive.google.com/file/d/{id}/view")),
            parents: file.parents.clone(),
            ..Default::default()
        };
        self.insert(created.clone(), &content);
        Ok(created)
    }

    async fn reparent(
        &self,
        file_id: &str,
        add_parent: &str,
        remove_parents: &[String],
        _fields: &str,
    ) -> Result<DriveFile> {
        self.record(Call::Reparent {
            file_id: file_id.into(),
            add_parent: add_parent.into(),
            remove_parents: remove_parents.to_vec(),
        })?;
        self.update(file_id, |file| {
            file.parents.retain(|p| !remove_parents.contains(p));
            file.parents.push(add_parent.to_string());
        })
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.record(Call::Delete {
            file_id: file_id.into(),
        })?;
        self.find(file_id)?;
        self.files
            .lock()
            .expect("files lock")
            .retain(|(f, _)| f.id != file_id);
        Ok(())
    }

    async fn share_public(&self, file_id: &str) -> Result<()> {
        self.record(Call::SharePublic {
            file_id: file_id.into(),
        })?;
        self.update(file_id, |file| {
            file.web_content_link = Some(format!(
                "https://drive.google.com/uc?id={}&export=download",
                file.id
            ));
        })
        .map(|_| ())
    }
}
