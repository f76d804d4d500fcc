pub mod db;
pub mod email;
pub mod error;
pub mod logging;
pub mod model;
pub mod persist;
pub mod retriever;
pub mod secrets;
pub mod settings;
pub mod sink;
pub mod storage;

pub use db::{Database, DatabaseError};
pub use email::{GmailBackend, ImapBackend};
pub use error::{
    ConfigurationError, MessageProcessingError, RetrievalError, SettingsError, StorageError,
};
pub use model::{AttachmentRecord, DiscoveredAttachment, MailboxConfig, MailboxKind};
pub use persist::Persister;
pub use retriever::{AttachmentRetriever, MailboxBackend};
pub use secrets::{SecretError, SecretSource};
pub use settings::{load_settings, Settings};
pub use sink::MetadataSink;
pub use storage::AttachmentStore;
