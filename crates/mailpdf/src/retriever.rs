//! Backend-agnostic entry point for one retrieval pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::email::gmail::{GmailBackend, HttpGmailTransport, TokenRefresher};
use crate::email::imap::{ImapBackend, TlsSessionConnector};
use crate::error::{RetrievalError, SettingsError};
use crate::model::{AttachmentRecord, MailboxConfig, MailboxKind};
use crate::persist::Persister;
use crate::settings::Settings;
use crate::sink::MetadataSink;
use crate::storage::AttachmentStore;

/// One mailbox protocol.
///
/// `retrieve` validates the config's credentials before any network call and
/// returns only after every matching attachment of the pass has been
/// persisted or dropped.
#[async_trait]
pub trait MailboxBackend: Send + Sync {
    fn kind(&self) -> MailboxKind;

    async fn retrieve(
        &self,
        config: &MailboxConfig,
        persister: &Persister<'_>,
    ) -> Result<Vec<AttachmentRecord>, RetrievalError>;
}

/// Dispatches a mailbox config to the backend registered for its kind.
pub struct AttachmentRetriever {
    backends: HashMap<MailboxKind, Arc<dyn MailboxBackend>>,
    store: AttachmentStore,
    sink: Arc<dyn MetadataSink>,
}

impl AttachmentRetriever {
    /// Creates a retriever with no backends registered.
    pub fn new(store: AttachmentStore, sink: Arc<dyn MetadataSink>) -> Self {
        Self {
            backends: HashMap::new(),
            store,
            sink,
        }
    }

    /// Creates a retriever with the IMAP and Gmail backends configured from
    /// `settings`.
    pub fn from_settings(
        settings: &Settings,
        sink: Arc<dyn MetadataSink>,
    ) -> Result<Self, SettingsError> {
        let connector = TlsSessionConnector::new(
            settings.imap.connect_timeout(),
            settings.imap.accept_invalid_certs,
        );
        let imap = ImapBackend::new(Arc::new(connector))
            .with_parse_concurrency(settings.imap.parse_concurrency);

        let transport = HttpGmailTransport::new(settings.gmail.api_base_url.as_str())
            .map_err(|e| SettingsError::HttpClient(e.to_string()))?;
        let mut gmail = GmailBackend::new(Arc::new(transport));
        if let Some(client) = settings.gmail.oauth_client()? {
            let refresher = TokenRefresher::new(settings.gmail.token_url.as_str(), client)
                .map_err(|e| SettingsError::HttpClient(e.to_string()))?;
            gmail = gmail.with_refresher(refresher);
        }

        let mut retriever = Self::new(AttachmentStore::new(&settings.storage_dir), sink);
        retriever.register(Arc::new(imap));
        retriever.register(Arc::new(gmail));
        Ok(retriever)
    }

    /// Installs `backend` for its kind, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn MailboxBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }

    /// Runs one pass over the trailing window of `config`'s mailbox.
    pub async fn retrieve(
        &self,
        config: &MailboxConfig,
    ) -> Result<Vec<AttachmentRecord>, RetrievalError> {
        let kind = config.kind();
        let backend = self
            .backends
            .get(&kind)
            .ok_or_else(|| RetrievalError::no_backend(kind))?;

        info!("Retrieving PDFs for mailbox {} ({}, {})", config.id, config.name, kind);
        let persister = Persister::new(&self.store, self.sink.as_ref(), config.id, Utc::now());
        backend.retrieve(config, &persister).await
    }
}
