//! OAuth2 session provider for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GmailError, Result};

/// Scopes requested for the trash mover.
///
/// gmail.modify allows relabelling and trashing but never permanent deletion.
pub const REQUIRED_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

/// Default credentials location relative to the working directory
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials/credentials.json";
/// Default directory for the token cache when `CONFIG_DIR` is unset
pub const DEFAULT_CONFIG_DIR: &str = "data";
/// File name of the token cache inside the config directory
pub const TOKEN_FILE_NAME: &str = "token.json";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Resolve credential and token cache paths.
///
/// Precedence: explicit argument, then `CREDENTIALS_PATH` / `TOKEN_PATH`
/// from the environment (a `.env` file is loaded by the binary beforehand),
/// then the defaults. The default token path lives under `CONFIG_DIR`
/// (`data` when unset).
pub fn resolve_paths(
    credentials_path: Option<&Path>,
    token_path: Option<&Path>,
) -> (PathBuf, PathBuf) {
    let credentials = credentials_path
        .map(Path::to_path_buf)
        .or_else(|| non_empty_env("CREDENTIALS_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH));

    let token = token_path
        .map(Path::to_path_buf)
        .or_else(|| non_empty_env("TOKEN_PATH").map(PathBuf::from))
        .unwrap_or_else(|| {
            let dir = non_empty_env("CONFIG_DIR").unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
            PathBuf::from(dir).join(TOKEN_FILE_NAME)
        });

    (credentials, token)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Runs the installed-app flow (opening a browser) when no valid token is
/// cached, and persists refreshed tokens to `token_cache_path`.
///
/// # Errors
/// Every failure, including a missing credentials file, is reported as
/// [`GmailError::AuthError`].
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    if !credentials_path.exists() {
        return Err(GmailError::AuthError(format!(
            "Credentials file not found: {}",
            credentials_path.display()
        )));
    }

    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::AuthError(format!("Failed to create token directory: {}", e))
            })?;
        }
    }

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so a broken login fails before any API call
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }
    debug!("Token cache at {}", token_cache_path.display());

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    info!("Authenticated with Gmail API");
    Ok(Gmail::new(client, auth))
}

/// Restrict the token cache to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
