//! Binary entry point for the wmcp-gdrive MCP server.

use anyhow::Context;
use clap::Parser;
use rmcp::ServiceExt;
use std::path::{Path, PathBuf};
use wmcp_gdrive::GdriveServer;
use wmcp_gdrive::auth::{self, ConsentFlow};
use wmcp_gdrive::client::{DEFAULT_API_BASE, DriveClient};

/// Walrus MCP Google Drive Server: exposes Drive files as resources and tools.
#[derive(Parser)]
#[command(name = "wmcp-gdrive", version, about)]
struct Cli {
    /// `auth` runs the interactive consent flow; anything else serves.
    mode: Option<String>,

    /// Credentials file written by `auth` and read at startup.
    #[arg(
        long,
        env = "MCP_GDRIVE_CREDENTIALS",
        default_value = "credentials/.gdrive-server-credentials.json"
    )]
    credentials: PathBuf,

    /// OAuth client keys file.
    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        default_value = "credentials/gcp-oauth.keys.json"
    )]
    keys: PathBuf,

    #[arg(long, env = "MCP_GDRIVE_API_BASE", default_value = DEFAULT_API_BASE, hide = true)]
    api_base: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let outcome = if cli.mode.as_deref() == Some("auth") {
        authenticate(&cli.keys, &cli.credentials)
            .await
            .context("Authentication failed")
    } else {
        serve(&cli).await
    };
    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn authenticate(keys_path: &Path, credentials_path: &Path) -> anyhow::Result<()> {
    println!("Looking for keys at: {}", keys_path.display());
    println!("Will save credentials to: {}", credentials_path.display());

    let keys = auth::load_keys(keys_path).await?;
    let flow = ConsentFlow::start(keys).await?;
    println!("Authorize this app by visiting:\n{}", flow.url());
    flow.finish(credentials_path).await?;

    println!("Credentials saved. You can now run the server.");
    Ok(())
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    let session = auth::load_session(&cli.credentials).await?;
    tracing::info!(api_base = %cli.api_base, "starting drive server");
    let client = DriveClient::with_api_base(session, &cli.api_base)?;
    let server = GdriveServer::new(client);
    server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start server")?
        .waiting()
        .await
        .context("server error")?;
    Ok(())
}
