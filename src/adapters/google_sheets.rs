use crate::adapters::{endpoint, http_client, unexpected_response};
use crate::core::{SheetCredential, SheetSession, SpreadsheetClient};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const SERVICE: &str = "Google Sheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<SheetInfo>,
}

#[derive(Debug, Deserialize)]
struct SheetInfo {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Service-account client for the Sheets v4 REST API.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    http: Client,
    base_url: String,
    token_url: String,
}

impl GoogleSheetsClient {
    pub fn new(base_url: impl Into<String>, token_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout, reqwest::header::HeaderMap::new())?,
            base_url: base_url.into(),
            token_url: token_url.into(),
        })
    }

    fn signed_assertion(&self, credential: &SheetCredential) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .map_err(|e| SyncError::auth(format!("GOOGLE_API_PRIVATE_KEY is not a valid RSA key: {}", e)))?;

        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &credential.client_email,
            scope: SCOPE,
            aud: &self.token_url,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SyncError::auth(format!("Could not sign the service account assertion: {}", e)))
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    type Session = GoogleSheetsSession;

    async fn authenticate(&self, credential: &SheetCredential) -> Result<GoogleSheetsSession> {
        tracing::debug!("🔐 Requesting spreadsheet access token for {}", credential.client_email);
        let assertion = self.signed_assertion(credential)?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(format!(
                "Token exchange failed (HTTP {}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(GoogleSheetsSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            access_token: token.access_token,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleSheetsSession {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GoogleSheetsSession {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: url::Url,
        query: &[(&str, &str)],
        resource: impl FnOnce() -> String,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(SyncError::not_found(resource())),
            _ => Err(unexpected_response(SERVICE, response).await),
        }
    }
}

#[async_trait]
impl SheetSession for GoogleSheetsSession {
    async fn list_worksheets(&self, spreadsheet_id: &str) -> Result<Vec<String>> {
        let url = endpoint(&self.base_url, &["v4", "spreadsheets", spreadsheet_id])?;
        let info: SpreadsheetInfo = self
            .get_json(url, &[("fields", "sheets.properties.title")], || {
                format!("spreadsheet '{}'", spreadsheet_id)
            })
            .await?;

        Ok(info.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn get_rows(&self, spreadsheet_id: &str, worksheet: &str) -> Result<Vec<Vec<String>>> {
        let range = format!("'{}'", worksheet.replace('\'', "''"));
        let url = endpoint(&self.base_url, &["v4", "spreadsheets", spreadsheet_id, "values", &range])?;
        let values: ValueRange = self
            .get_json(
                url,
                &[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")],
                || format!("worksheet '{}' in spreadsheet '{}'", worksheet, spreadsheet_id),
            )
            .await?;

        tracing::debug!("📄 Worksheet '{}' returned {} rows", worksheet, values.values.len());
        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
