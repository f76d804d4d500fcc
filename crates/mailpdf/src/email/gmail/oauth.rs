//! OAuth token blobs stored with Gmail mailboxes, and access-token refresh.

use chrono::{DateTime, Duration, Utc};
use log::info;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::api::{create_http_client, sanitize_error_body};
use crate::error::{ConfigurationError, RetrievalError};

/// Google's OAuth 2.0 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// A token expiring within this many seconds is treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Token blob as written by the authorization flow.
#[derive(Debug, Deserialize)]
struct StoredToken {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    expiry_date: Option<i64>,
}

/// Parsed OAuth token for one mailbox.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Parses a stored token blob.
    ///
    /// A JSON object is read for `access_token`, `refresh_token` and
    /// `expiry_date`. Anything else is taken as a bare access token.
    pub fn parse(mailbox_id: i64, blob: &SecretString) -> Result<Self, ConfigurationError> {
        let raw = blob.expose_secret().trim();
        if raw.is_empty() {
            return Err(ConfigurationError::MissingToken { mailbox_id });
        }

        if !raw.starts_with('{') {
            return Ok(Self {
                access_token: Some(SecretString::from(raw.to_string())),
                refresh_token: None,
                expires_at: None,
            });
        }

        let stored: StoredToken =
            serde_json::from_str(raw).map_err(|e| ConfigurationError::InvalidField {
                mailbox_id,
                field: "oauthToken",
                reason: format!("not a valid token document: {}", e),
            })?;

        let token = Self {
            access_token: non_empty(stored.access_token),
            refresh_token: non_empty(stored.refresh_token),
            expires_at: stored.expiry_date.and_then(DateTime::from_timestamp_millis),
        };

        if token.access_token.is_none() && token.refresh_token.is_none() {
            return Err(ConfigurationError::EmptyToken { mailbox_id });
        }
        Ok(token)
    }

    /// Checks if the access token is expired (or expires within the buffer).
    /// A token without a known expiry is assumed valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + Duration::seconds(EXPIRY_BUFFER_SECS),
            None => false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// How a pass obtains its bearer token.
#[derive(Debug, Clone)]
pub enum AccessPlan {
    /// Use the stored access token as is.
    Use(SecretString),
    /// Exchange the refresh token first.
    Refresh(SecretString),
}

impl AccessPlan {
    /// Decides without any network call. `can_refresh` tells whether OAuth
    /// client credentials are configured.
    pub fn decide(
        mailbox_id: i64,
        token: &OAuthToken,
        now: DateTime<Utc>,
        can_refresh: bool,
    ) -> Result<Self, ConfigurationError> {
        match (&token.access_token, &token.refresh_token) {
            (Some(access), _) if !token.is_expired(now) => Ok(AccessPlan::Use(access.clone())),
            (_, Some(refresh)) if can_refresh => Ok(AccessPlan::Refresh(refresh.clone())),
            // Expired and not refreshable; the API decides.
            (Some(access), _) => Ok(AccessPlan::Use(access.clone())),
            (None, _) => Err(ConfigurationError::InvalidField {
                mailbox_id,
                field: "oauthToken",
                reason: "no access token and no OAuth client configured to refresh one"
                    .to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth client credentials used for refresh.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: SecretString,
    pub client_secret: SecretString,
}

/// Exchanges refresh tokens for access tokens.
pub struct TokenRefresher {
    client: Client,
    token_url: String,
    credentials: OAuthClient,
}

impl TokenRefresher {
    pub fn new(token_url: impl Into<String>, credentials: OAuthClient) -> Result<Self, RetrievalError> {
        let client = create_http_client().map_err(|e| RetrievalError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            token_url: token_url.into(),
            credentials,
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Refreshes an access token using a refresh token.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<SecretString, RetrievalError> {
        info!("Refreshing access token");

        let params = [
            ("client_id", self.credentials.client_id.expose_secret()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(format!("Token refresh failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Connection(format!(
                "Token refresh failed ({}): {}",
                status,
                sanitize_error_body(&body)
            )));
        }

        let token: RefreshResponse = response.json().await.map_err(|e| {
            RetrievalError::Protocol(format!("Failed to parse refresh response: {}", e))
        })?;

        info!(
            "Successfully refreshed access token (expires in {:?}s)",
            token.expires_in
        );
        Ok(SecretString::from(token.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_parse_json_blob() {
        let blob = secret(
            r#"{"access_token":"ya29.a","refresh_token":"1//r","scope":"gmail.readonly","token_type":"Bearer","expiry_date":1772443800000}"#,
        );
        let token = OAuthToken::parse(1, &blob).unwrap();
        assert_eq!(token.access_token.unwrap().expose_secret(), "ya29.a");
        assert_eq!(token.refresh_token.unwrap().expose_secret(), "1//r");
        assert_eq!(
            token.expires_at.unwrap().to_rfc3339(),
            "2026-03-02T09:30:00+00:00"
        );
    }

    #[test]
    fn test_parse_bare_token() {
        let token = OAuthToken::parse(1, &secret("ya29.bare")).unwrap();
        assert_eq!(token.access_token.unwrap().expose_secret(), "ya29.bare");
        assert!(token.refresh_token.is_none());
        assert!(!OAuthToken::parse(1, &secret("x")).unwrap().is_expired(Utc::now()));
    }

    #[test]
    fn test_empty_blobs_are_rejected() {
        assert_eq!(
            OAuthToken::parse(3, &secret("   ")).unwrap_err(),
            ConfigurationError::MissingToken { mailbox_id: 3 }
        );
        assert_eq!(
            OAuthToken::parse(3, &secret(r#"{"access_token":""}"#)).unwrap_err(),
            ConfigurationError::EmptyToken { mailbox_id: 3 }
        );
        assert!(matches!(
            OAuthToken::parse(3, &secret("{not json")),
            Err(ConfigurationError::InvalidField { field: "oauthToken", .. })
        ));
    }

    #[test]
    fn test_plan_prefers_valid_access_token() {
        let now = Utc::now();
        let token = OAuthToken {
            access_token: Some(secret("a")),
            refresh_token: Some(secret("r")),
            expires_at: Some(now + Duration::hours(1)),
        };
        assert!(matches!(
            AccessPlan::decide(1, &token, now, true).unwrap(),
            AccessPlan::Use(_)
        ));
    }

    #[test]
    fn test_plan_refreshes_expired_token() {
        let now = Utc::now();
        let token = OAuthToken {
            access_token: Some(secret("a")),
            refresh_token: Some(secret("r")),
            expires_at: Some(now + Duration::seconds(10)),
        };
        assert!(matches!(
            AccessPlan::decide(1, &token, now, true).unwrap(),
            AccessPlan::Refresh(_)
        ));
        // Without client credentials the stale token is still tried.
        assert!(matches!(
            AccessPlan::decide(1, &token, now, false).unwrap(),
            AccessPlan::Use(_)
        ));
    }

    #[test]
    fn test_plan_rejects_refresh_only_without_client() {
        let token = OAuthToken {
            access_token: None,
            refresh_token: Some(secret("r")),
            expires_at: None,
        };
        assert!(matches!(
            AccessPlan::decide(2, &token, Utc::now(), false),
            Err(ConfigurationError::InvalidField { mailbox_id: 2, .. })
        ));
    }
}
