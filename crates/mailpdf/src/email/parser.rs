//! Raw message parsing and PDF attachment extraction.

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{Message, MessageParser, MimeHeaders};

use crate::error::MessageProcessingError;
use crate::model::{DiscoveredAttachment, PDF_MIME_TYPE};

/// Header fields of the message an attachment came from.
#[derive(Debug, Clone, Default)]
pub struct EmailInfo {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Parses a full RFC 5322 message and returns its PDF attachments.
///
/// `message_id` only labels log lines and errors. `fallback_date` is used
/// when the message has no parseable `Date` header.
pub fn extract_pdf_attachments(
    raw_email: &[u8],
    message_id: &str,
    fallback_date: Option<DateTime<Utc>>,
) -> Result<Vec<DiscoveredAttachment>, MessageProcessingError> {
    let message = MessageParser::default().parse(raw_email).ok_or_else(|| {
        MessageProcessingError::Parse {
            id: message_id.to_string(),
            reason: "not a valid RFC 5322 message".to_string(),
        }
    })?;

    let info = extract_email_info(&message);
    let received_at = info.date.or(fallback_date);

    debug!(
        "Parsing message {} subject={:?}",
        message_id,
        info.subject.as_deref().unwrap_or("(no subject)")
    );

    let mut attachments = Vec::new();
    for part in message.attachments() {
        let mime_type = part
            .content_type()
            .map(|ct| match ct.subtype() {
                Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                None => ct.ctype().to_string(),
            })
            .unwrap_or_default();

        let filename = part.attachment_name().map(str::to_string);

        if !is_pdf(&mime_type) {
            debug!(
                "Skipping attachment {:?} with content type '{}'",
                filename, mime_type
            );
            continue;
        }

        attachments.push(DiscoveredAttachment {
            filename,
            content: part.contents().to_vec(),
            subject: info.subject.clone(),
            sender: info.from.clone(),
            received_at,
        });
    }

    debug!(
        "Extracted {} PDF attachments from message {}",
        attachments.len(),
        message_id
    );
    Ok(attachments)
}

/// True when `mime_type` is exactly `application/pdf`, ignoring case.
pub fn is_pdf(mime_type: &str) -> bool {
    mime_type.trim().eq_ignore_ascii_case(PDF_MIME_TYPE)
}

fn extract_email_info(message: &Message) -> EmailInfo {
    EmailInfo {
        subject: message.subject().map(|s| s.to_string()),
        from: message
            .from()
            .and_then(|addr| addr.first().map(format_address)),
        date: message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0)),
    }
}

/// Formats an address as "Name <email@example.com>", or just the address
/// when there is no display name.
fn format_address(addr: &mail_parser::Addr) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => format!("{} <{}>", name, address),
        (Some(name), None) => name.to_string(),
        (None, address) => address.unwrap_or_default().to_string(),
    }
}
