use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of the service-account assertion exchanged for a short-lived
/// access token.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Drive file metadata relevant to the download response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

/// Remote file host client. Authenticates with a signed RS256 assertion
/// (service-account flow) and streams the file content.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    token_url: String,
    api_base: String,
    client_email: String,
    key: EncodingKey,
    file_id: String,
}

impl DriveClient {
    /// Creates a new `DriveClient`, parsing the service-account key up
    /// front so a bad key fails at startup rather than on the first sale.
    pub fn new(http: reqwest::Client, cfg: &Config) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(cfg.drive_private_key.as_bytes())
            .map_err(|e| AppError::Internal(format!("invalid service-account key: {}", e)))?;

        Ok(Self {
            http,
            token_url: cfg.google_token_url.clone(),
            api_base: cfg.drive_api_base.trim_end_matches('/').to_string(),
            client_email: cfg.drive_client_email.clone(),
            key,
            file_id: cfg.drive_file_id.clone(),
        })
    }

    /// Signs the assertion and exchanges it for a bearer token valid for
    /// about an hour.
    pub async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + 3600,
        };

        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AppError::Internal(format!("assertion signing failed: {}", e)))?;

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("token exchange request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("token exchange body read failed: {}", e)))?;

        if !status.is_success() {
            tracing::error!("🔑 Token exchange rejected ({}): {}", status, body);
            return Err(AppError::Upstream(
                "Falha ao obter access_token".to_string(),
            ));
        }

        let parsed: TokenResponse = sonic_rs::from_str(&body)
            .map_err(|e| AppError::Upstream(format!("unparseable token response: {}", e)))?;

        parsed
            .access_token
            .ok_or_else(|| AppError::Upstream("token response missing access_token".to_string()))
    }

    pub async fn file_metadata(&self, access_token: &str) -> Result<FileMetadata> {
        let url = format!(
            "{}/drive/v3/files/{}?fields=name,mimeType,size",
            self.api_base, self.file_id
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("metadata request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("📁 Metadata fetch rejected ({}): {}", status, body);
            return Err(AppError::Upstream(
                "Falha ao obter metadata do arquivo".to_string(),
            ));
        }

        resp.json::<FileMetadata>()
            .await
            .map_err(|e| AppError::Upstream(format!("unparseable metadata: {}", e)))
    }

    /// Opens the content stream. The caller owns the response and decides
    /// when bytes start flowing to the buyer.
    pub async fn download(&self, access_token: &str) -> Result<reqwest::Response> {
        let url = format!(
            "{}/drive/v3/files/{}?alt=media",
            self.api_base, self.file_id
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("download request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("📁 Download rejected ({}): {}", status, body);
            return Err(AppError::Upstream("Falha ao baixar arquivo".to_string()));
        }

        Ok(resp)
    }
}
