//! IMAP retrieval pass: EXAMINE → SEARCH → FETCH → LOGOUT.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::session::{FetchedBody, ImapTarget, MailSession, SessionConnector, INBOX};
use crate::email::parser::extract_pdf_attachments;
use crate::error::RetrievalError;
use crate::model::{window_start, AttachmentRecord, MailboxConfig, MailboxKind};
use crate::persist::Persister;
use crate::retriever::MailboxBackend;

/// Bodies buffered between the fetch stream and the parsers.
const FETCH_CHANNEL_CAPACITY: usize = 16;

/// Default number of messages parsed and persisted at the same time.
pub const DEFAULT_PARSE_CONCURRENCY: usize = 4;

/// Retrieves PDF attachments from an IMAP inbox.
pub struct ImapBackend {
    connector: Arc<dyn SessionConnector>,
    parse_concurrency: usize,
}

impl ImapBackend {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            parse_concurrency: DEFAULT_PARSE_CONCURRENCY,
        }
    }

    pub fn with_parse_concurrency(mut self, parse_concurrency: usize) -> Self {
        self.parse_concurrency = parse_concurrency.max(1);
        self
    }

    /// Everything between login and logout. Errors are pass-fatal.
    async fn run_session(
        &self,
        session: &mut dyn MailSession,
        persister: &Persister<'_>,
    ) -> Result<Vec<AttachmentRecord>, RetrievalError> {
        session.examine(INBOX).await?;

        let cutoff = window_start(persister.retrieved_at());
        let uids = session.search(&search_query(cutoff)).await?;

        if uids.is_empty() {
            info!("No messages in the trailing window");
            return Ok(Vec::new());
        }
        info!("Found {} messages to inspect", uids.len());

        let (tx, rx) = mpsc::channel(FETCH_CHANNEL_CAPACITY);
        let producer = session.fetch_bodies(&uids, tx);
        let consumer = self.consume(rx, persister, cutoff);

        // The consumer ends once the producer drops its sender, so joining
        // both is the end-of-batch barrier.
        let (fetched, records) = tokio::join!(producer, consumer);
        if let Err(e) = fetched {
            if !records.is_empty() {
                warn!(
                    "Fetch aborted after {} attachments were stored; they stay recorded",
                    records.len()
                );
            }
            return Err(e);
        }
        Ok(records)
    }

    /// Parses and persists bodies as they arrive, in arrival order of
    /// completion rather than search order.
    async fn consume(
        &self,
        rx: mpsc::Receiver<FetchedBody>,
        persister: &Persister<'_>,
        cutoff: DateTime<Utc>,
    ) -> Vec<AttachmentRecord> {
        let bodies = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|body| (body, rx))
        });

        let batches: Vec<Vec<AttachmentRecord>> = bodies
            .map(|body| process_body(body, persister, cutoff))
            .buffer_unordered(self.parse_concurrency)
            .collect()
            .await;

        batches.into_iter().flatten().collect()
    }
}

/// Handles one message; failures only skip this message.
async fn process_body(
    body: FetchedBody,
    persister: &Persister<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<AttachmentRecord> {
    let label = body
        .uid
        .map(|uid| format!("UID {}", uid))
        .unwrap_or_else(|| "(no UID)".to_string());

    if let Some(internal_date) = body.internal_date {
        if internal_date < cutoff {
            debug!("Message {} arrived at {} before the window, skipping", label, internal_date);
            return Vec::new();
        }
    }

    let attachments = match extract_pdf_attachments(&body.raw, &label, body.internal_date) {
        Ok(attachments) => attachments,
        Err(e) => {
            warn!("Error processing message {}: {}", label, e);
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        if let Some(record) = persister.persist_or_skip(attachment).await {
            records.push(record);
        }
    }
    records
}

/// SEARCH criterion for messages that may fall inside the window.
///
/// `SINCE` compares dates in the server's own timezone, so the day before
/// the cutoff's UTC date is requested. Bodies older than the cutoff are
/// dropped afterwards by INTERNALDATE.
pub fn search_query(cutoff: DateTime<Utc>) -> String {
    format!("SINCE {}", imap_date(cutoff - Duration::days(1)))
}

/// Formats a timestamp as an IMAP search date (`DD-Mon-YYYY`).
pub fn imap_date(at: DateTime<Utc>) -> String {
    at.format("%d-%b-%Y").to_string()
}

#[async_trait]
impl MailboxBackend for ImapBackend {
    fn kind(&self) -> MailboxKind {
        MailboxKind::Imap
    }

    async fn retrieve(
        &self,
        config: &MailboxConfig,
        persister: &Persister<'_>,
    ) -> Result<Vec<AttachmentRecord>, RetrievalError> {
        let target = ImapTarget::from_config(config)?;
        let span = info_span!("imap_retrieve", mailbox = config.id, host = %target.host);

        async move {
            let mut session = self.connector.connect(&target).await?;

            let result = self.run_session(session.as_mut(), persister).await;

            // Close on both paths; a pass-fatal error still wins over a
            // failed LOGOUT.
            if let Err(e) = session.logout().await {
                warn!("Failed to end IMAP session cleanly: {}", e);
            }

            let records = result?;
            info!("IMAP pass complete: {} attachments", records.len());
            Ok(records)
        }
        .instrument(span)
        .await
    }
}
