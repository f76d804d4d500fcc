//! Mailbox configuration and attachment record types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// The only content type the engine extracts.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Subject recorded when the source message has none.
pub const NO_SUBJECT: &str = "No Subject";

/// Sender recorded when the source message has none.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Name used when an attachment carries no filename.
pub const UNNAMED_ATTACHMENT: &str = "unnamed.pdf";

/// Length of the trailing lookback window, in hours.
pub const TRAILING_WINDOW_HOURS: i64 = 24;

/// Returns the lower bound of the trailing window relative to `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(TRAILING_WINDOW_HOURS)
}

/// Backend family a mailbox is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailboxKind {
    /// Stateful IMAP session.
    #[serde(rename = "IMAP")]
    Imap,
    /// Gmail REST API.
    #[serde(rename = "GMAIL")]
    Gmail,
}

impl MailboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailboxKind::Imap => "IMAP",
            MailboxKind::Gmail => "GMAIL",
        }
    }
}

impl fmt::Display for MailboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MailboxKind {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMAP" => Ok(MailboxKind::Imap),
            "GMAIL" => Ok(MailboxKind::Gmail),
            _ => Err(RetrievalError::UnsupportedBackendKind(s.to_string())),
        }
    }
}

/// Credentials for an IMAP mailbox.
///
/// Fields other than the username may be missing in storage; the IMAP
/// backend rejects such configs before connecting.
#[derive(Debug, Clone)]
pub struct ImapCredentials {
    pub username: String,
    pub secret: Option<SecretString>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Credentials for a Gmail mailbox: the token blob written by the
/// authorization flow.
#[derive(Debug, Clone, Default)]
pub struct GmailCredentials {
    pub oauth_token: Option<SecretString>,
}

/// Per-kind credentials. Exactly one variant exists per config, so the kind
/// is always derived from it.
#[derive(Debug, Clone)]
pub enum MailboxCredentials {
    Imap(ImapCredentials),
    Gmail(GmailCredentials),
}

/// One mailbox to poll.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub id: i64,
    pub name: String,
    pub credentials: MailboxCredentials,
}

impl MailboxConfig {
    pub fn imap(id: i64, name: impl Into<String>, credentials: ImapCredentials) -> Self {
        Self {
            id,
            name: name.into(),
            credentials: MailboxCredentials::Imap(credentials),
        }
    }

    pub fn gmail(id: i64, name: impl Into<String>, oauth_token: Option<SecretString>) -> Self {
        Self {
            id,
            name: name.into(),
            credentials: MailboxCredentials::Gmail(GmailCredentials { oauth_token }),
        }
    }

    pub fn kind(&self) -> MailboxKind {
        match self.credentials {
            MailboxCredentials::Imap(_) => MailboxKind::Imap,
            MailboxCredentials::Gmail(_) => MailboxKind::Gmail,
        }
    }
}

/// A matching attachment found by a backend, not yet persisted.
#[derive(Debug, Clone)]
pub struct DiscoveredAttachment {
    /// Original filename as declared by the message, if any.
    pub filename: Option<String>,
    pub content: Vec<u8>,
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// One persisted attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    pub filename: String,
    pub source_subject: String,
    pub source_sender: String,
    pub received_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub storage_path: PathBuf,
    pub mailbox_config_id: i64,
}
