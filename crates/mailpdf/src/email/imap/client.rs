//! TLS IMAP client built on async-imap.

use std::net::ToSocketAddrs;
use std::time::Duration;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use super::session::{FetchedBody, ImapTarget, MailSession, SessionConnector};
use crate::error::RetrievalError;

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Connects over TCP + TLS and logs in with username and password.
pub struct TlsSessionConnector {
    connect_timeout: Duration,
    accept_invalid_certs: bool,
}

impl TlsSessionConnector {
    /// `accept_invalid_certs` relaxes both certificate and hostname checks so
    /// servers with self-signed certificates can be reached.
    pub fn new(connect_timeout: Duration, accept_invalid_certs: bool) -> Self {
        Self {
            connect_timeout,
            accept_invalid_certs,
        }
    }

    async fn open_tcp(&self, target: &ImapTarget) -> Result<AsyncTcpStream, RetrievalError> {
        let addr = format!("{}:{}", target.host, target.port);
        let addrs: Vec<std::net::SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| RetrievalError::Connection(format!("DNS lookup for {} failed: {}", addr, e)))?
            .collect();

        let mut last_error = None;
        for socket_addr in addrs {
            match tokio::time::timeout(self.connect_timeout, AsyncTcpStream::connect(socket_addr))
                .await
            {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => last_error = Some(e.to_string()),
                Err(_) => {
                    last_error = Some(format!("timed out after {:?}", self.connect_timeout))
                }
            }
            debug!("Connecting to {} failed, trying next address", socket_addr);
        }

        Err(RetrievalError::Connection(format!(
            "TCP connect to {} failed: {}",
            addr,
            last_error.unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }
}

#[async_trait]
impl SessionConnector for TlsSessionConnector {
    async fn connect(&self, target: &ImapTarget) -> Result<Box<dyn MailSession>, RetrievalError> {
        info!("Connecting to IMAP server at {}:{}", target.host, target.port);

        let tcp_stream = self.open_tcp(target).await?;

        let tls = TlsConnector::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_certs);
        let tls_stream = tls
            .connect(&target.host, tcp_stream)
            .await
            .map_err(|e| RetrievalError::Connection(format!("TLS handshake failed: {}", e)))?;

        let client = async_imap::Client::new(tls_stream);
        let session = client
            .login(&target.username, target.password.expose_secret())
            .await
            .map_err(|(e, _)| RetrievalError::Connection(format!("Authentication failed: {}", e)))?;

        info!("Successfully authenticated as {}", target.username);
        Ok(Box::new(ImapClient {
            session: Some(session),
        }))
    }
}

/// An authenticated async-imap session.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
}

impl ImapClient {
    fn session(&mut self) -> Result<&mut Session<TlsStream>, RetrievalError> {
        self.session
            .as_mut()
            .ok_or_else(|| RetrievalError::Connection("Not connected".to_string()))
    }
}

#[async_trait]
impl MailSession for ImapClient {
    /// Uses EXAMINE (not SELECT) so flags are left untouched.
    async fn examine(&mut self, folder: &str) -> Result<(), RetrievalError> {
        info!("Examining folder: {}", folder);
        let mailbox = self
            .session()?
            .examine(folder)
            .await
            .map_err(|e| RetrievalError::Protocol(format!("EXAMINE {} failed: {}", folder, e)))?;
        debug!("Folder '{}' holds {} messages", folder, mailbox.exists);
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<u32>, RetrievalError> {
        debug!("Searching with query: {}", query);
        let uids = self
            .session()?
            .uid_search(query)
            .await
            .map_err(|e| RetrievalError::Protocol(format!("SEARCH failed: {}", e)))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        debug!("Found {} messages matching search", uid_list.len());
        Ok(uid_list)
    }

    /// Uses BODY.PEEK[] so messages are not marked as read.
    async fn fetch_bodies(
        &mut self,
        uids: &[u32],
        bodies: mpsc::Sender<FetchedBody>,
    ) -> Result<(), RetrievalError> {
        if uids.is_empty() {
            return Ok(());
        }

        let uid_set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        debug!("Fetching {} messages with UIDs: {}", uids.len(), uid_set);

        let messages = self
            .session()?
            .uid_fetch(&uid_set, "(UID INTERNALDATE BODY.PEEK[])")
            .await
            .map_err(|e| RetrievalError::Protocol(format!("FETCH failed: {}", e)))?;
        let mut messages = std::pin::pin!(messages);

        let mut delivered = 0usize;
        while let Some(message_result) = messages.next().await {
            let message = message_result
                .map_err(|e| RetrievalError::Protocol(format!("FETCH stream failed: {}", e)))?;

            let Some(body) = message.body() else {
                warn!("Message UID {:?} arrived without a body, skipping", message.uid);
                continue;
            };

            let fetched = FetchedBody {
                uid: message.uid,
                internal_date: message.internal_date().map(|d| d.with_timezone(&Utc)),
                raw: body.to_vec(),
            };
            if bodies.send(fetched).await.is_err() {
                return Err(RetrievalError::Protocol(
                    "message consumer stopped before the fetch completed".to_string(),
                ));
            }
            delivered += 1;
        }

        debug!("Fetch complete, {} bodies delivered", delivered);
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), RetrievalError> {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            session
                .logout()
                .await
                .map_err(|e| RetrievalError::Protocol(format!("LOGOUT failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit logout - session will be closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_unresolvable_host_is_a_connection_error() {
        let connector = TlsSessionConnector::new(Duration::from_secs(1), true);
        let target = ImapTarget {
            host: "imap.invalid".to_string(),
            port: 993,
            username: "me@example.com".to_string(),
            password: SecretString::from("secret"),
        };

        let result = connector.connect(&target).await;
        assert!(matches!(result, Err(RetrievalError::Connection(_))));
    }
}
