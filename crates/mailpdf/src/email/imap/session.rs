//! Protocol-level seams of the IMAP backend.
//!
//! [`SessionConnector`] covers DISCONNECTED → AUTHENTICATED, and
//! [`MailSession`] covers every state after that up to LOGOUT.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::error::{ConfigurationError, RetrievalError};
use crate::model::{ImapCredentials, MailboxConfig};

/// Default port for IMAP over TLS.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// The only folder the backend searches.
pub const INBOX: &str = "INBOX";

/// Validated connection parameters for one IMAP mailbox.
#[derive(Debug, Clone)]
pub struct ImapTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl ImapTarget {
    /// Checks that every field needed to log in is present.
    pub fn from_credentials(
        mailbox_id: i64,
        credentials: &ImapCredentials,
    ) -> Result<Self, ConfigurationError> {
        let missing = |field| ConfigurationError::MissingField { mailbox_id, field };

        let host = credentials
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| missing("host"))?;
        if credentials.username.trim().is_empty() {
            return Err(missing("username"));
        }
        let password = credentials.secret.clone().ok_or_else(|| missing("password"))?;
        let port = credentials.port.unwrap_or(DEFAULT_IMAP_PORT);
        if port == 0 {
            return Err(ConfigurationError::InvalidField {
                mailbox_id,
                field: "port",
                reason: "port must be between 1 and 65535".to_string(),
            });
        }

        Ok(Self {
            host: host.to_string(),
            port,
            username: credentials.username.clone(),
            password,
        })
    }

    /// Extracts the target from a config, rejecting non-IMAP credentials.
    pub fn from_config(config: &MailboxConfig) -> Result<Self, ConfigurationError> {
        match &config.credentials {
            crate::model::MailboxCredentials::Imap(creds) => Self::from_credentials(config.id, creds),
            crate::model::MailboxCredentials::Gmail(_) => Err(ConfigurationError::InvalidField {
                mailbox_id: config.id,
                field: "kind",
                reason: "expected IMAP credentials".to_string(),
            }),
        }
    }
}

/// One fully received message body.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub uid: Option<u32>,
    /// Server-side arrival time (`INTERNALDATE`).
    pub internal_date: Option<DateTime<Utc>>,
    pub raw: Vec<u8>,
}

/// Opens an authenticated session.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, target: &ImapTarget) -> Result<Box<dyn MailSession>, RetrievalError>;
}

/// An authenticated IMAP session.
#[async_trait]
pub trait MailSession: Send {
    /// Opens `folder` read-only.
    async fn examine(&mut self, folder: &str) -> Result<(), RetrievalError>;

    /// Runs a UID SEARCH and returns the matching UIDs.
    async fn search(&mut self, query: &str) -> Result<Vec<u32>, RetrievalError>;

    /// Fetches full bodies for `uids`, sending each one into `bodies` as soon
    /// as it has been received. Returns once the server has finished the
    /// fetch. A failure of the fetch stream itself is returned as an error.
    async fn fetch_bodies(
        &mut self,
        uids: &[u32],
        bodies: mpsc::Sender<FetchedBody>,
    ) -> Result<(), RetrievalError>;

    /// Ends the session.
    async fn logout(&mut self) -> Result<(), RetrievalError>;
}
