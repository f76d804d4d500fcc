//! Isolated store directory and database for one test.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use mailpdf::db::{attachment_repo, mailbox_repo, Database};
use mailpdf::{AttachmentRecord, AttachmentRetriever, AttachmentStore, MailboxBackend};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            db: Database::open_in_memory().expect("Failed to create test database"),
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.temp_dir.path().join("pdfs")
    }

    /// Seeds a mailbox row so records can reference it.
    pub fn seed_mailbox(&self, kind: &str) -> i64 {
        mailbox_repo::insert(
            &self.db,
            &mailbox_repo::NewMailbox {
                name: format!("{} test", kind),
                kind: kind.to_string(),
                username: "me@example.com".to_string(),
                ..Default::default()
            },
        )
        .expect("Failed to seed mailbox")
    }

    pub fn retriever(&self, backend: Arc<dyn MailboxBackend>) -> AttachmentRetriever {
        let mut retriever = AttachmentRetriever::new(
            AttachmentStore::new(self.storage_dir()),
            Arc::new(self.db.clone()),
        );
        retriever.register(backend);
        retriever
    }

    pub fn recorded(&self, mailbox_id: i64) -> Vec<AttachmentRecord> {
        attachment_repo::list_by_mailbox(&self.db, mailbox_id).expect("Failed to list records")
    }

    /// Names of the files currently in the store directory.
    pub fn stored_files(&self) -> Vec<String> {
        list_dir(&self.storage_dir())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
