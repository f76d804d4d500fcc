//! Shared test utilities for mailpdf integration tests.
//!
//! - `TestHarness` for an isolated store directory and in-memory database
//! - Builders for raw RFC 5322 messages and Gmail API payloads
//! - Scripted IMAP server and Gmail transport fakes
//! - A loopback HTTP server with canned responses

pub mod builders;
pub mod fakes;
pub mod harness;
pub mod http;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
pub use http::CannedHttp;
