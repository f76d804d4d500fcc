use std::path::PathBuf;
use thiserror::Error;

use crate::model::MailboxKind;

/// Missing or invalid credentials for the selected backend.
///
/// Always detected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Gmail mailbox {mailbox_id} requires an OAuth token")]
    MissingToken { mailbox_id: i64 },

    #[error("OAuth token for mailbox {mailbox_id} holds neither an access nor a refresh token")]
    EmptyToken { mailbox_id: i64 },

    #[error("IMAP mailbox {mailbox_id} is missing required field '{field}'")]
    MissingField {
        mailbox_id: i64,
        field: &'static str,
    },

    #[error("Mailbox {mailbox_id} has invalid field '{field}': {reason}")]
    InvalidField {
        mailbox_id: i64,
        field: &'static str,
        reason: String,
    },
}

/// Failures that abort a whole retrieval pass.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Unsupported email type: {0}")]
    UnsupportedBackendKind(String),

    #[error("Backend initialization failed: {0}")]
    BackendInitialization(#[from] ConfigurationError),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl RetrievalError {
    pub fn no_backend(kind: MailboxKind) -> Self {
        RetrievalError::UnsupportedBackendKind(kind.as_str().to_string())
    }
}

/// Failures scoped to one message or one attachment.
///
/// These are logged and the item is skipped; the pass continues.
#[derive(Error, Debug)]
pub enum MessageProcessingError {
    #[error("Failed to parse message {id}: {reason}")]
    Parse { id: String, reason: String },

    #[error("Failed to decode attachment '{filename}': {reason}")]
    Decode { filename: String, reason: String },

    #[error("Failed to fetch {what}: {reason}")]
    Fetch { what: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to record metadata for '{filename}': {source}")]
    Metadata {
        filename: String,
        #[source]
        source: crate::db::DatabaseError,
    },
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
