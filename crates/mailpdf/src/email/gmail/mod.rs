//! Gmail REST API backend.

pub mod api;
pub mod backend;
pub mod oauth;

pub use api::{ApiError, GmailTransport, HttpGmailTransport, DEFAULT_API_BASE_URL};
pub use backend::GmailBackend;
pub use oauth::{OAuthClient, OAuthToken, TokenRefresher, DEFAULT_TOKEN_URL};
