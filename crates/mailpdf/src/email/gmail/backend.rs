//! Gmail REST retrieval pass: list → get → attachments.get.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tracing::{debug, info, info_span, warn, Instrument};

use super::api::{GmailMessage, GmailTransport, MessagePart};
use super::oauth::{AccessPlan, OAuthToken, TokenRefresher};
use crate::email::parser::is_pdf;
use crate::error::{ConfigurationError, MessageProcessingError, RetrievalError};
use crate::model::{
    window_start, AttachmentRecord, DiscoveredAttachment, MailboxConfig, MailboxCredentials,
    MailboxKind,
};
use crate::persist::Persister;
use crate::retriever::MailboxBackend;

/// base64url that accepts both padded and unpadded input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Retrieves PDF attachments through the Gmail API.
pub struct GmailBackend {
    transport: Arc<dyn GmailTransport>,
    refresher: Option<TokenRefresher>,
}

impl GmailBackend {
    pub fn new(transport: Arc<dyn GmailTransport>) -> Self {
        Self {
            transport,
            refresher: None,
        }
    }

    /// Enables refreshing expired access tokens.
    pub fn with_refresher(mut self, refresher: TokenRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Validates credentials and picks the token plan. No network calls.
    fn plan_access(
        &self,
        config: &MailboxConfig,
        now: DateTime<Utc>,
    ) -> Result<AccessPlan, ConfigurationError> {
        let credentials = match &config.credentials {
            MailboxCredentials::Gmail(credentials) => credentials,
            MailboxCredentials::Imap(_) => {
                return Err(ConfigurationError::InvalidField {
                    mailbox_id: config.id,
                    field: "kind",
                    reason: "expected Gmail credentials".to_string(),
                })
            }
        };

        let blob = credentials
            .oauth_token
            .as_ref()
            .ok_or(ConfigurationError::MissingToken {
                mailbox_id: config.id,
            })?;
        let token = OAuthToken::parse(config.id, blob)?;
        AccessPlan::decide(config.id, &token, now, self.refresher.is_some())
    }

    async fn access_token(&self, plan: AccessPlan) -> Result<SecretString, RetrievalError> {
        match (plan, &self.refresher) {
            (AccessPlan::Use(token), _) => Ok(token),
            (AccessPlan::Refresh(refresh_token), Some(refresher)) => {
                refresher.refresh(&refresh_token).await
            }
            (AccessPlan::Refresh(_), None) => Err(RetrievalError::Connection(
                "token refresh requested without an OAuth client".to_string(),
            )),
        }
    }

    /// Handles one message; failures only skip this message or attachment.
    async fn process_message(
        &self,
        token: &SecretString,
        message_id: &str,
        persister: &Persister<'_>,
    ) -> Vec<AttachmentRecord> {
        let message = match self.transport.get_message(token, message_id).await {
            Ok(message) => message,
            Err(e) => {
                let err = MessageProcessingError::Fetch {
                    what: format!("message {}", message_id),
                    reason: e.to_string(),
                };
                warn!("Error processing message {}: {}", message_id, err);
                return Vec::new();
            }
        };

        let Some(payload) = message.payload.as_ref() else {
            debug!("Message {} has no payload", message_id);
            return Vec::new();
        };

        let subject = header_value(payload, "Subject");
        let sender = header_value(payload, "From");
        let received_at = internal_date(&message);

        let mut pdf_parts = Vec::new();
        collect_pdf_parts(payload, &mut pdf_parts);
        debug!("Message {} has {} PDF parts", message_id, pdf_parts.len());

        let mut records = Vec::new();
        for part in pdf_parts {
            let filename = part.filename.clone().filter(|f| !f.trim().is_empty());
            let content = match self.part_content(token, message_id, part).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping attachment in message {}: {}", message_id, e);
                    continue;
                }
            };

            let attachment = DiscoveredAttachment {
                filename,
                content,
                subject: subject.clone(),
                sender: sender.clone(),
                received_at,
            };
            if let Some(record) = persister.persist_or_skip(attachment).await {
                records.push(record);
            }
        }
        records
    }

    /// Downloads (or takes inline) and decodes one part's content.
    async fn part_content(
        &self,
        token: &SecretString,
        message_id: &str,
        part: &MessagePart,
    ) -> Result<Vec<u8>, MessageProcessingError> {
        let label = part
            .filename
            .clone()
            .filter(|f| !f.is_empty())
            .or_else(|| part.part_id.clone())
            .unwrap_or_default();
        let body = part.body.as_ref();

        let encoded = if let Some(attachment_id) = body.and_then(|b| b.attachment_id.as_deref()) {
            self.transport
                .get_attachment(token, message_id, attachment_id)
                .await
                .map_err(|e| MessageProcessingError::Fetch {
                    what: format!("attachment '{}' of message {}", label, message_id),
                    reason: e.to_string(),
                })?
                .data
        } else if let Some(data) = body.and_then(|b| b.data.clone()) {
            data
        } else {
            return Err(MessageProcessingError::Fetch {
                what: format!("attachment '{}' of message {}", label, message_id),
                reason: "part has neither an attachment id nor inline data".to_string(),
            });
        };

        decode_base64url(&encoded).map_err(|reason| MessageProcessingError::Decode {
            filename: label,
            reason,
        })
    }
}

#[async_trait]
impl MailboxBackend for GmailBackend {
    fn kind(&self) -> MailboxKind {
        MailboxKind::Gmail
    }

    async fn retrieve(
        &self,
        config: &MailboxConfig,
        persister: &Persister<'_>,
    ) -> Result<Vec<AttachmentRecord>, RetrievalError> {
        let plan = self.plan_access(config, persister.retrieved_at())?;
        let span = info_span!("gmail_retrieve", mailbox = config.id);

        async move {
            let token = self.access_token(plan).await?;
            let query = build_query(persister.retrieved_at());
            debug!("Listing messages with query: {}", query);

            let listing = self
                .transport
                .list_messages(&token, &query)
                .await
                .map_err(|e| RetrievalError::Protocol(format!("Failed to list messages: {}", e)))?;

            if listing.messages.is_empty() {
                info!("No messages in the trailing window");
                return Ok(Vec::new());
            }
            info!("Found {} messages to inspect", listing.messages.len());
            if listing.next_page_token.is_some() {
                debug!("Listing has further pages; only the first page is processed");
            }

            let mut records = Vec::new();
            for message in &listing.messages {
                records.extend(self.process_message(&token, &message.id, persister).await);
            }

            info!("Gmail pass complete: {} attachments", records.len());
            Ok(records)
        }
        .instrument(span)
        .await
    }
}

/// Search query for messages with attachments received after the window
/// start.
pub fn build_query(now: DateTime<Utc>) -> String {
    format!("after:{} has:attachment", window_start(now).timestamp())
}

/// Depth-first walk of the part tree collecting `application/pdf` parts.
fn collect_pdf_parts<'m>(part: &'m MessagePart, out: &mut Vec<&'m MessagePart>) {
    if part.mime_type.as_deref().is_some_and(is_pdf) {
        out.push(part);
    }
    for child in &part.parts {
        collect_pdf_parts(child, out);
    }
}

/// First header named `name`, ignoring case.
fn header_value(part: &MessagePart, name: &str) -> Option<String> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn internal_date(message: &GmailMessage) -> Option<DateTime<Utc>> {
    message
        .internal_date
        .as_deref()
        .and_then(|ms| ms.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

/// Decodes Gmail's base64url content, with or without padding.
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_URL.decode(cleaned).map_err(|e| e.to_string())
}
