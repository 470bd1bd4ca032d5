//! Failures raised by the Drive gateway and content resolver.
//!
//! Every remote failure is carried as a [`DriveError`] and rendered exactly
//! once, by [`DriveError::describe`], into the text of a tool error envelope.

use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = DriveError> = std::result::Result<T, E>;

/// One entry of the `errors` list in a Google API error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiSubError>,
}

/// Errors from Drive operations.
#[derive(Error, Debug)]
pub enum DriveError {
    /// The Drive API answered with a non-success status.
    #[error("{message}")]
    Api {
        code: Option<u16>,
        message: String,
        errors: Vec<ApiSubError>,
    },
    /// The request never produced a usable response.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// A response body could not be decoded.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
    /// Upload content declared as binary was not valid base64.
    #[error("content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// A resource URI outside the `gdrive:///` scheme.
    #[error("unsupported resource URI: {0}")]
    UnsupportedUri(String),
    /// A file id that cannot name a single path segment.
    #[error("invalid file ID: {0:?}")]
    InvalidFileId(String),
    /// The configured API base cannot carry request paths.
    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl DriveError {
    /// Build an [`DriveError::Api`] from a failed response.
    ///
    /// Google's `{"error": {...}}` body is used when present; anything else
    /// falls back to the HTTP status and the raw body text.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse { error }) => DriveError::Api {
                code: error.code.or(Some(status)),
                message: if error.message.is_empty() {
                    format!("request failed with status {status}")
                } else {
                    error.message
                },
                errors: error.errors,
            },
            Err(_) => DriveError::Api {
                code: Some(status),
                message: if body.trim().is_empty() {
                    format!("request failed with status {status}")
                } else {
                    body.trim().to_string()
                },
                errors: Vec::new(),
            },
        }
    }

    /// Provider status code, when the failure came from the API.
    pub fn code(&self) -> Option<u16> {
        match self {
            DriveError::Api { code, .. } => *code,
            DriveError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }

    /// Human-readable diagnostic: message, then code and sub-errors if known.
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        if let Some(code) = self.code() {
            text.push_str(&format!(" (Code: {code})"));
        }
        if let DriveError::Api { errors, .. } = self
            && !errors.is_empty()
        {
            let details = serde_json::to_string(errors).unwrap_or_default();
            text.push_str(&format!(" (Details: {details})"));
        }
        text
    }

    /// Wrap this failure in an error envelope prefixed with `context`.
    pub fn envelope(&self, context: &str) -> CallToolResult {
        CallToolResult::error(vec![Content::text(format!(
            "{context}: {}",
            self.describe()
        ))])
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ApiSubError, DriveError};

    #[test]
    fn parses_google_error_body() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "File not found: abc.",
                "errors": [{"domain": "global", "reason": "notFound", "message": "File not found: abc.", "locationType": "parameter", "location": "fileId"}]
            }
        }"#;
        let err = DriveError::from_response(404, body);
        assert!(err.is_not_found());
        match &err {
            DriveError::Api { errors, .. } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].reason.as_deref(), Some("notFound"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_status_and_body() {
        let err = DriveError::from_response(502, "Bad Gateway");
        assert_eq!(err.describe(), "Bad Gateway (Code: 502)");

        let err = DriveError::from_response(500, "");
        assert_eq!(
            err.describe(),
            "request failed with status 500 (Code: 500)"
        );
    }

    #[test]
    fn describe_appends_code_and_details() {
        let err = DriveError::Api {
            code: Some(403),
            message: "The user's Drive storage quota has been exceeded.".into(),
            errors: vec![ApiSubError {
                domain: Some("usageLimits".into()),
                reason: Some("storageQuotaExceeded".into()),
                message: None,
                location_type: None,
                location: None,
            }],
        };
        assert_eq!(
            err.describe(),
            "The user's Drive storage quota has been exceeded. (Code: 403) \
             (Details: [{\"domain\":\"usageLimits\",\"reason\":\"storageQuotaExceeded\"}])"
        );
    }

    #[test]
    fn envelope_sets_error_flag() {
        let err = DriveError::UnsupportedUri("file:///etc/passwd".into());
        let result = err.envelope("Error reading file");
        assert_eq!(result.is_error, Some(true));
        let text = result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert_eq!(
            text,
            "Error reading file: unsupported resource URI: file:///etc/passwd"
        );
    }
}
