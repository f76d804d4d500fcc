//! Gmail REST API v1 types and HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Base URL of the authenticated user's Gmail resources.
pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Default connect timeout for HTTP requests (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length for error bodies carried in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Errors from a single Gmail API call.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Gmail API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Gmail API response: {0}")]
    InvalidResponse(String),
}

/// Response of `users.messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response of `users.messages.get` with `format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<MessagePartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// base64url-encoded inline content.
    #[serde(default)]
    pub data: Option<String>,
}

/// Response of `users.messages.attachments.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentBody {
    #[serde(default)]
    pub size: Option<u64>,
    /// base64url-encoded content.
    pub data: String,
}

/// The three Gmail calls the backend needs.
#[async_trait]
pub trait GmailTransport: Send + Sync {
    async fn list_messages(
        &self,
        token: &SecretString,
        query: &str,
    ) -> Result<ListMessagesResponse, ApiError>;

    async fn get_message(&self, token: &SecretString, id: &str) -> Result<GmailMessage, ApiError>;

    async fn get_attachment(
        &self,
        token: &SecretString,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError>;
}

/// Creates an HTTP client with appropriate timeouts.
pub fn create_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Http(format!("Failed to create HTTP client: {}", e)))
}

/// Truncates an error body so tokens echoed back by a server do not flood
/// logs.
pub fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

/// Gmail transport over reqwest with bearer authentication.
pub struct HttpGmailTransport {
    client: Client,
    base_url: String,
}

impl HttpGmailTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: create_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                body: sanitize_error_body(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl GmailTransport for HttpGmailTransport {
    async fn list_messages(
        &self,
        token: &SecretString,
        query: &str,
    ) -> Result<ListMessagesResponse, ApiError> {
        self.get_json(token, "/messages", &[("q", query)]).await
    }

    async fn get_message(&self, token: &SecretString, id: &str) -> Result<GmailMessage, ApiError> {
        self.get_json(token, &format!("/messages/{}", id), &[("format", "full")])
            .await
    }

    async fn get_attachment(
        &self,
        token: &SecretString,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError> {
        self.get_json(
            token,
            &format!("/messages/{}/attachments/{}", message_id, attachment_id),
            &[],
        )
        .await
    }
}
