//! IMAP backend.

pub mod backend;
pub mod client;
pub mod session;

pub use backend::{search_query, ImapBackend, DEFAULT_PARSE_CONCURRENCY};
pub use client::{ImapClient, TlsSessionConnector};
pub use session::{FetchedBody, ImapTarget, MailSession, SessionConnector, DEFAULT_IMAP_PORT};
