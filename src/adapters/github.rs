use crate::adapters::{endpoint, http_client, unexpected_response};
use crate::core::{FileLocation, RemoteFile, RepositoryHost, RepositorySession};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const SERVICE: &str = "GitHub";

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

/// GitHub REST API, contents endpoints.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: String,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    type Session = GitHubSession;

    async fn authenticate(&self, token: &str) -> Result<GitHubSession> {
        if token.trim().is_empty() {
            return Err(SyncError::auth("GITHUB_TOKEN is empty"));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| SyncError::auth("GITHUB_TOKEN contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        Ok(GitHubSession {
            http: http_client(self.timeout, headers)?,
            base_url: self.base_url.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GitHubSession {
    http: Client,
    base_url: String,
}

impl GitHubSession {
    fn contents_url(&self, location: FileLocation<'_>) -> Result<Url> {
        let mut segments = vec!["repos", location.owner, location.repo, "contents"];
        segments.extend(location.path.split('/').filter(|s| !s.is_empty()));
        endpoint(&self.base_url, &segments)
    }

    async fn exists(&self, segments: &[&str]) -> Result<bool> {
        let response = self.http.get(endpoint(&self.base_url, segments)?).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected_response(SERVICE, response).await),
        }
    }

    /// A 404 on the contents API is ambiguous; check the branch, then the
    /// repository, to tell a missing file from a missing parent.
    async fn classify_missing(&self, location: FileLocation<'_>, branch: &str) -> Result<Option<RemoteFile>> {
        if self
            .exists(&["repos", location.owner, location.repo, "branches", branch])
            .await?
        {
            tracing::debug!("📭 {} does not exist on {} yet", location.path, branch);
            return Ok(None);
        }

        if self.exists(&["repos", location.owner, location.repo]).await? {
            Err(SyncError::not_found(format!(
                "branch '{}' in {}/{}",
                branch, location.owner, location.repo
            )))
        } else {
            Err(SyncError::not_found(format!(
                "repository {}/{}",
                location.owner, location.repo
            )))
        }
    }

    /// Files over 1 MB come back without inline content.
    async fn read_blob(&self, location: FileLocation<'_>, sha: &str) -> Result<String> {
        let url = endpoint(
            &self.base_url,
            &["repos", location.owner, location.repo, "git", "blobs", sha],
        )?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(unexpected_response(SERVICE, response).await);
        }
        let blob: BlobResponse = response.json().await?;
        Ok(blob.content)
    }
}

#[async_trait]
impl RepositorySession for GitHubSession {
    async fn read_file(&self, location: FileLocation<'_>, branch: &str) -> Result<Option<RemoteFile>> {
        let response = self
            .http
            .get(self.contents_url(location)?)
            .query(&[("ref", branch)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return self.classify_missing(location, branch).await,
            status if !status.is_success() => return Err(unexpected_response(SERVICE, response).await),
            _ => {}
        }

        let body: serde_json::Value = response.json().await?;
        if body.is_array() {
            return Err(SyncError::validation(format!("{} is a directory", location.path)));
        }
        let file: ContentResponse = serde_json::from_value(body)?;
        if file.kind != "file" {
            return Err(SyncError::validation(format!(
                "{} is a {}, not a file",
                location.path, file.kind
            )));
        }

        let encoded = if file.encoding == "base64" || file.size == 0 {
            file.content
        } else {
            tracing::debug!("📦 {} is {} bytes, reading blob {}", location.path, file.size, file.sha);
            self.read_blob(location, &file.sha).await?
        };

        Ok(Some(RemoteFile {
            content: decode_content(&encoded)?,
            sha: file.sha,
        }))
    }

    async fn write_file(
        &self,
        location: FileLocation<'_>,
        branch: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let request = WriteRequest {
            message,
            content: STANDARD.encode(content),
            branch,
            sha,
        };

        let response = self
            .http
            .put(self.contents_url(location)?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let written: WriteResponse = response.json().await?;
            return Ok(written.commit.sha);
        }

        match status {
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::ConflictError {
                    branch: branch.to_string(),
                    message: body,
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("sha") {
                    Err(SyncError::ConflictError {
                        branch: branch.to_string(),
                        message: body,
                    })
                } else {
                    Err(SyncError::ApiError {
                        service: SERVICE.to_string(),
                        status: status.as_u16(),
                        message: body,
                    })
                }
            }
            StatusCode::NOT_FOUND => Err(SyncError::not_found(format!(
                "branch '{}' in {}/{}",
                branch, location.owner, location.repo
            ))),
            _ => Err(unexpected_response(SERVICE, response).await),
        }
    }
}

/// GitHub wraps base64 payloads at 60 columns.
fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SyncError::validation(format!("Remote file is not valid base64: {}", e)))
}
