//! Store-then-record step shared by every backend.

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::error::MessageProcessingError;
use crate::model::{AttachmentRecord, DiscoveredAttachment, NO_SUBJECT, UNKNOWN_SENDER};
use crate::sink::MetadataSink;
use crate::storage::AttachmentStore;

/// Turns discovered attachments into records for one mailbox pass.
pub struct Persister<'a> {
    store: &'a AttachmentStore,
    sink: &'a dyn MetadataSink,
    mailbox_config_id: i64,
    retrieved_at: DateTime<Utc>,
}

impl<'a> Persister<'a> {
    pub fn new(
        store: &'a AttachmentStore,
        sink: &'a dyn MetadataSink,
        mailbox_config_id: i64,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            sink,
            mailbox_config_id,
            retrieved_at,
        }
    }

    pub fn mailbox_config_id(&self) -> i64 {
        self.mailbox_config_id
    }

    /// Start of the pass; the fallback `received_at`.
    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    /// Writes the payload, then the record. If the record cannot be written
    /// the file is removed again so no record-less file remains.
    pub async fn persist(
        &self,
        attachment: DiscoveredAttachment,
    ) -> Result<AttachmentRecord, MessageProcessingError> {
        let path = self
            .store
            .persist(&attachment.content, attachment.filename.as_deref())
            .await?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let record = AttachmentRecord {
            filename,
            source_subject: non_blank(attachment.subject).unwrap_or_else(|| NO_SUBJECT.to_string()),
            source_sender: non_blank(attachment.sender)
                .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            received_at: attachment.received_at.unwrap_or(self.retrieved_at),
            size_bytes: attachment.content.len() as u64,
            storage_path: path,
            mailbox_config_id: self.mailbox_config_id,
        };

        if let Err(e) = self.sink.record(&record) {
            if let Err(cleanup) = self.store.discard(&record.storage_path).await {
                warn!("Failed to remove unrecorded file: {}", cleanup);
            }
            return Err(e.into());
        }

        debug!(
            "Recorded '{}' ({} bytes) for mailbox {}",
            record.filename, record.size_bytes, record.mailbox_config_id
        );
        Ok(record)
    }

    /// Like [`persist`](Self::persist), but logs and swallows the error.
    pub async fn persist_or_skip(&self, attachment: DiscoveredAttachment) -> Option<AttachmentRecord> {
        let name = attachment
            .filename
            .clone()
            .unwrap_or_else(|| "(unnamed)".to_string());
        match self.persist(attachment).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!("Dropping attachment '{}': {}", name, e);
                None
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
