//! HTTP, environment and terminal implementations of the domain ports.

pub mod confirm;
pub mod github;
pub mod google_sheets;
pub mod secrets;

pub use confirm::AutoConfirm;
#[cfg(feature = "cli")]
pub use confirm::TerminalConfirm;
pub use github::{GitHubClient, GitHubSession};
pub use google_sheets::{GoogleSheetsClient, GoogleSheetsSession};
pub use secrets::{EnvSecrets, StaticSecrets};

use crate::utils::error::{Result, SyncError};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("sheet-sync/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client(timeout: Duration, headers: HeaderMap) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?)
}

/// Joins `segments` onto `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| SyncError::config(format!("Invalid API base URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| SyncError::config(format!("API base URL '{}' cannot have a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Maps a non-success response that the caller has no special handling for.
pub(crate) async fn unexpected_response(service: &str, response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("📡 {} responded {}: {}", service, status, body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::auth(format!("{} rejected the credentials (HTTP {})", service, status.as_u16()))
        }
        _ => SyncError::ApiError {
            service: service.to_string(),
            status: status.as_u16(),
            message: body,
        },
    }
}
