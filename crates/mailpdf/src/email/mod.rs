//! Mailbox backends.
//!
//! Both backends search the trailing window, keep `application/pdf`
//! attachments and hand them to a [`Persister`](crate::persist::Persister).

pub mod gmail;
pub mod imap;
pub mod parser;

pub use gmail::GmailBackend;
pub use imap::ImapBackend;
pub use parser::{extract_pdf_attachments, is_pdf};
