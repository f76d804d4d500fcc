//! Builders for test messages.

#![allow(dead_code)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;

use mailpdf::email::gmail::api::{GmailMessage, Header, MessagePart, MessagePartBody};
use mailpdf::email::imap::FetchedBody;

/// A minimal valid PDF payload.
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

/// Not a PDF, whatever the name says.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Builder for a multipart/mixed message with attachments.
pub struct EmailBuilder {
    subject: Option<String>,
    from: Option<String>,
    date: Option<String>,
    attachments: Vec<(String, String, Vec<u8>)>,
}

impl EmailBuilder {
    pub fn new() -> Self {
        Self {
            subject: Some("Your invoice".to_string()),
            from: Some("Billing Dept <billing@example.com>".to_string()),
            date: Some("Mon, 02 Mar 2026 09:30:00 +0000".to_string()),
            attachments: Vec::new(),
        }
    }

    pub fn subject(mut self, subject: Option<&str>) -> Self {
        self.subject = subject.map(str::to_string);
        self
    }

    pub fn sender(mut self, from: Option<&str>) -> Self {
        self.from = from.map(str::to_string);
        self
    }

    pub fn attach(mut self, content_type: &str, filename: &str, content: &[u8]) -> Self {
        self.attachments
            .push((content_type.to_string(), filename.to_string(), content.to_vec()));
        self
    }

    pub fn pdf(self, filename: &str) -> Self {
        self.attach("application/pdf", filename, PDF_BYTES)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = String::new();
        if let Some(from) = &self.from {
            out.push_str(&format!("From: {}\r\n", from));
        }
        out.push_str("To: me@example.com\r\n");
        if let Some(subject) = &self.subject {
            out.push_str(&format!("Subject: {}\r\n", subject));
        }
        if let Some(date) = &self.date {
            out.push_str(&format!("Date: {}\r\n", date));
        }
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n\r\n");
        out.push_str("--BOUNDARY\r\nContent-Type: text/plain\r\n\r\nPlease see attached.\r\n");

        for (content_type, filename, content) in &self.attachments {
            out.push_str("--BOUNDARY\r\n");
            out.push_str(&format!(
                "Content-Type: {}; name=\"{}\"\r\n",
                content_type, filename
            ));
            out.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{}\"\r\n",
                filename
            ));
            out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            out.push_str(&STANDARD.encode(content));
            out.push_str("\r\n");
        }
        out.push_str("--BOUNDARY--\r\n");
        out.into_bytes()
    }

    /// Wraps the message as a body that arrived just now.
    pub fn fetched(&self, uid: u32) -> FetchedBody {
        FetchedBody {
            uid: Some(uid),
            internal_date: Some(Utc::now()),
            raw: self.build(),
        }
    }
}

impl Default for EmailBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// base64url without padding, as the Gmail API returns it.
pub fn gmail_encode(content: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(content)
}

/// A Gmail `format=full` message whose PDF parts reference attachment ids
/// `<id>-att-<n>`.
pub fn gmail_message(id: &str, subject: &str, from: &str, parts: &[(&str, &str)]) -> GmailMessage {
    let parts = parts
        .iter()
        .enumerate()
        .map(|(n, (mime_type, filename))| MessagePart {
            part_id: Some(n.to_string()),
            mime_type: Some(mime_type.to_string()),
            filename: Some(filename.to_string()),
            body: Some(MessagePartBody {
                attachment_id: Some(format!("{}-att-{}", id, n)),
                size: Some(PDF_BYTES.len() as u64),
                data: None,
            }),
            ..Default::default()
        })
        .collect();

    GmailMessage {
        id: id.to_string(),
        internal_date: Some(Utc::now().timestamp_millis().to_string()),
        payload: Some(MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            headers: vec![
                Header {
                    name: "Subject".to_string(),
                    value: subject.to_string(),
                },
                Header {
                    name: "From".to_string(),
                    value: from.to_string(),
                },
            ],
            parts,
            ..Default::default()
        }),
    }
}
