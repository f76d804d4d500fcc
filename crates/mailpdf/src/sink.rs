//! Metadata sink for persisted attachments.

use crate::db::{attachment_repo, Database};
use crate::error::StorageError;
use crate::model::AttachmentRecord;

/// Receives one record per successfully stored attachment.
///
/// The store behind a sink serializes its own writes; callers hold no lock.
pub trait MetadataSink: Send + Sync {
    fn record(&self, record: &AttachmentRecord) -> Result<(), StorageError>;
}

impl MetadataSink for Database {
    fn record(&self, record: &AttachmentRecord) -> Result<(), StorageError> {
        attachment_repo::insert(self, record).map_err(|e| StorageError::Metadata {
            filename: record.filename.clone(),
            source: e,
        })
    }
}
