//! Scripted stand-ins for the IMAP server and the Gmail API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use mailpdf::email::gmail::api::{
    ApiError, AttachmentBody, GmailMessage, GmailTransport, ListMessagesResponse, MessageRef,
};
use mailpdf::email::imap::{FetchedBody, ImapTarget, MailSession, SessionConnector};
use mailpdf::RetrievalError;

/// What the fake IMAP server saw.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    pub connects: usize,
    pub examined: Vec<String>,
    pub searches: Vec<String>,
    pub fetches: usize,
    pub logouts: usize,
}

/// An IMAP server holding a fixed set of messages; every message matches
/// every search.
#[derive(Clone, Default)]
pub struct FakeImapServer {
    messages: Vec<FetchedBody>,
    fail_login: bool,
    fail_fetch_after: Option<usize>,
    log: Arc<Mutex<SessionLog>>,
}

impl FakeImapServer {
    pub fn new(messages: Vec<FetchedBody>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn failing_login() -> Self {
        Self {
            fail_login: true,
            ..Default::default()
        }
    }

    /// Breaks the fetch stream after `delivered` bodies.
    pub fn with_fetch_failure(mut self, delivered: usize) -> Self {
        self.fail_fetch_after = Some(delivered);
        self
    }

    pub fn log(&self) -> SessionLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for FakeImapServer {
    async fn connect(&self, _target: &ImapTarget) -> Result<Box<dyn MailSession>, RetrievalError> {
        self.log.lock().unwrap().connects += 1;
        if self.fail_login {
            return Err(RetrievalError::Connection(
                "Authentication failed: invalid credentials".to_string(),
            ));
        }
        Ok(Box::new(FakeSession {
            server: self.clone(),
        }))
    }
}

struct FakeSession {
    server: FakeImapServer,
}

#[async_trait]
impl MailSession for FakeSession {
    async fn examine(&mut self, folder: &str) -> Result<(), RetrievalError> {
        self.server.log.lock().unwrap().examined.push(folder.to_string());
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<u32>, RetrievalError> {
        self.server.log.lock().unwrap().searches.push(query.to_string());
        Ok(self.server.messages.iter().filter_map(|m| m.uid).collect())
    }

    async fn fetch_bodies(
        &mut self,
        uids: &[u32],
        bodies: mpsc::Sender<FetchedBody>,
    ) -> Result<(), RetrievalError> {
        self.server.log.lock().unwrap().fetches += 1;
        let wanted = self
            .server
            .messages
            .iter()
            .filter(|m| m.uid.is_some_and(|uid| uids.contains(&uid)));

        for (delivered, message) in wanted.enumerate() {
            if self.server.fail_fetch_after == Some(delivered) {
                return Err(RetrievalError::Protocol(
                    "FETCH stream failed: connection reset".to_string(),
                ));
            }
            if bodies.send(message.clone()).await.is_err() {
                return Err(RetrievalError::Protocol("consumer gone".to_string()));
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), RetrievalError> {
        self.server.log.lock().unwrap().logouts += 1;
        Ok(())
    }
}

/// A Gmail mailbox served from memory. Records every call it receives.
#[derive(Default)]
pub struct FakeGmail {
    messages: Vec<GmailMessage>,
    attachments: HashMap<String, Vec<u8>>,
    failing_messages: Vec<String>,
    failing_attachments: Vec<String>,
    fail_list: bool,
    calls: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
}

impl FakeGmail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message; each of its attachment ids serves `content`.
    pub fn with_message(mut self, message: GmailMessage, content: &[u8]) -> Self {
        for id in attachment_ids(&message) {
            self.attachments.insert(id, content.to_vec());
        }
        self.messages.push(message);
        self
    }

    pub fn with_failing_message(mut self, message: GmailMessage) -> Self {
        self.failing_messages.push(message.id.clone());
        self.messages.push(message);
        self
    }

    pub fn with_failing_attachment(mut self, attachment_id: &str) -> Self {
        self.failing_attachments.push(attachment_id.to_string());
        self
    }

    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Bearer tokens presented, one per call.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn note(&self, token: &SecretString, call: String) {
        assert!(!token.expose_secret().is_empty());
        self.tokens
            .lock()
            .unwrap()
            .push(token.expose_secret().to_string());
        self.calls.lock().unwrap().push(call);
    }
}

fn attachment_ids(message: &GmailMessage) -> Vec<String> {
    message
        .payload
        .iter()
        .flat_map(|p| p.parts.iter())
        .filter_map(|p| p.body.as_ref().and_then(|b| b.attachment_id.clone()))
        .collect()
}

fn server_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        body: "{\"error\":{\"code\":500}}".to_string(),
    }
}

#[async_trait]
impl GmailTransport for FakeGmail {
    async fn list_messages(
        &self,
        token: &SecretString,
        query: &str,
    ) -> Result<ListMessagesResponse, ApiError> {
        self.note(token, format!("list {}", query));
        if self.fail_list {
            return Err(server_error(503));
        }
        Ok(ListMessagesResponse {
            messages: self
                .messages
                .iter()
                .map(|m| MessageRef {
                    id: m.id.clone(),
                    thread_id: None,
                })
                .collect(),
            next_page_token: None,
            result_size_estimate: Some(self.messages.len() as u32),
        })
    }

    async fn get_message(&self, token: &SecretString, id: &str) -> Result<GmailMessage, ApiError> {
        self.note(token, format!("get {}", id));
        if self.failing_messages.iter().any(|m| m == id) {
            return Err(server_error(500));
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| server_error(404))
    }

    async fn get_attachment(
        &self,
        token: &SecretString,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError> {
        self.note(token, format!("attachment {} {}", message_id, attachment_id));
        if self.failing_attachments.iter().any(|a| a == attachment_id) {
            return Err(server_error(500));
        }
        let content = self
            .attachments
            .get(attachment_id)
            .ok_or_else(|| server_error(404))?;
        Ok(AttachmentBody {
            size: Some(content.len() as u64),
            data: super::builders::gmail_encode(content),
        })
    }
}
