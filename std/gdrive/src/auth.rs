//! OAuth session bootstrap.
//!
//! The server itself only needs a bearer token, read from a credentials file
//! at startup. The file is produced by the interactive [`ConsentFlow`]: a
//! loopback axum listener receives Google's redirect, the code is exchanged
//! at the token endpoint, and the result is written to disk.
//!
//! Tokens are never refreshed here.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;

/// Scopes requested during consent.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/drive.metadata",
];

const CALLBACK_PATH: &str = "/oauth2callback";
const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Credentials not found. Please run with 'auth' argument first.")]
    CredentialsNotFound,

    #[error(
        "Access was denied. If you saw \"Google hasn't verified this app\":\n\
         1. Click \"Advanced\"\n\
         2. Click \"Go to <app name> (unsafe)\"\n\
         3. Grant the requested permissions\n\
         Then run the 'auth' command again."
    )]
    AccessDenied,

    #[error("failed to access {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to open the consent callback listener: {0}")]
    Bind(#[source] io::Error),

    #[error("malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid OAuth keys: {0}")]
    Keys(String),

    #[error("authorization failed: {0}")]
    Consent(String),

    #[error("token exchange failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AuthError {
    fn io(path: &Path, source: io::Error) -> Self {
        AuthError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        AuthError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Bearer token bound to the server for its whole lifetime.
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// On-disk credentials artifact.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl Credentials {
    pub fn session(&self) -> Session {
        Session::new(self.access_token.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

pub async fn load_credentials(path: &Path) -> Result<Credentials, AuthError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AuthError::CredentialsNotFound);
        }
        Err(e) => return Err(AuthError::io(path, e)),
    };
    serde_json::from_str(&raw).map_err(|e| AuthError::json(path, e))
}

pub async fn load_session(path: &Path) -> Result<Session, AuthError> {
    let credentials = load_credentials(path).await?;
    tracing::debug!(path = %path.display(), "loaded credentials");
    Ok(credentials.session())
}

/// Write credentials, creating the parent directory if needed.
pub async fn save_credentials(path: &Path, credentials: &Credentials) -> Result<(), AuthError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AuthError::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(credentials).map_err(|e| AuthError::json(path, e))?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| AuthError::io(path, e))
}

/// OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientKeys {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct KeyFile {
    installed: Option<ClientKeys>,
    web: Option<ClientKeys>,
}

/// Read a keys file holding either an `installed` or a `web` client.
pub async fn load_keys(path: &Path) -> Result<ClientKeys, AuthError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AuthError::io(path, e))?;
    let file: KeyFile = serde_json::from_str(&raw).map_err(|e| AuthError::json(path, e))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| AuthError::Keys("expected an \"installed\" or \"web\" client".into()))
}

/// Browser consent URL for `keys`, redirecting to `redirect_uri`.
pub fn consent_url(keys: &ClientKeys, redirect_uri: &str) -> Result<reqwest::Url, AuthError> {
    let scope = SCOPES.join(" ");
    reqwest::Url::parse_with_params(
        &keys.auth_uri,
        [
            ("client_id", keys.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::Keys(format!("auth_uri {}: {e}", keys.auth_uri)))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

type CodeSender = oneshot::Sender<Result<String, AuthError>>;

#[derive(Clone)]
struct CallbackState {
    sender: Arc<Mutex<Option<CodeSender>>>,
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let (outcome, page) = match (params.code, params.error) {
        (_, Some(error)) if error == "access_denied" => (
            Err(AuthError::AccessDenied),
            "Access denied. Return to the terminal for instructions.",
        ),
        (_, Some(error)) => (
            Err(AuthError::Consent(error)),
            "Authorization failed. Return to the terminal for details.",
        ),
        (Some(code), None) => (
            Ok(code),
            "Authentication successful! You can close this window.",
        ),
        (None, None) => (
            Err(AuthError::Consent("redirect carried no code".into())),
            "Authorization failed. Return to the terminal for details.",
        ),
    };
    if let Some(sender) = state.sender.lock().await.take() {
        let _ = sender.send(outcome);
    }
    Html(page)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    id_token: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self, now_ms: i64) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|secs| now_ms + secs * 1000),
            id_token: self.id_token,
        }
    }
}

/// Trade an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    keys: &ClientKeys,
    code: &str,
    redirect_uri: &str,
) -> Result<Credentials, AuthError> {
    let response = http
        .post(&keys.token_uri)
        .form(&[
            ("code", code),
            ("client_id", keys.client_id.as_str()),
            ("client_secret", keys.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Consent(format!(
            "token endpoint returned {status}: {body}"
        )));
    }
    let token: TokenResponse = response.json().await?;
    Ok(token.into_credentials(chrono::Utc::now().timestamp_millis()))
}

/// An in-progress interactive authorization.
pub struct ConsentFlow {
    keys: ClientKeys,
    listener: TcpListener,
    redirect_uri: String,
    url: reqwest::Url,
}

impl ConsentFlow {
    /// Bind the loopback listener on an ephemeral port.
    pub async fn start(keys: ClientKeys) -> Result<Self, AuthError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(AuthError::Bind)?;
        let port = listener.local_addr().map_err(AuthError::Bind)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}{CALLBACK_PATH}");
        let url = consent_url(&keys, &redirect_uri)?;
        tracing::debug!(%redirect_uri, "consent listener bound");
        Ok(Self {
            keys,
            listener,
            redirect_uri,
            url,
        })
    }

    /// URL the user must open to grant consent.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the redirect, exchange the code, and persist credentials.
    pub async fn finish(self, credentials_path: &Path) -> Result<Credentials, AuthError> {
        let Self {
            keys,
            listener,
            redirect_uri,
            ..
        } = self;
        let code = wait_for_code(listener).await?;
        let http = reqwest::Client::new();
        let credentials = exchange_code(&http, &keys, &code, &redirect_uri).await?;
        save_credentials(credentials_path, &credentials).await?;
        tracing::info!(path = %credentials_path.display(), "credentials saved");
        Ok(credentials)
    }
}

/// Serve the callback route until the first redirect arrives.
async fn wait_for_code(listener: TcpListener) -> Result<String, AuthError> {
    let (tx, rx) = oneshot::channel();
    let state = CallbackState {
        sender: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route(CALLBACK_PATH, get(callback))
        .with_state(state);

    let shutdown = CancellationToken::new();
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                tracing::warn!(error = %e, "consent listener failed");
            }
        })
    };

    let outcome = rx
        .await
        .unwrap_or_else(|_| Err(AuthError::Consent("consent listener stopped".into())));
    shutdown.cancel();
    let _ = server.await;
    outcome
}
