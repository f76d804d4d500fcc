//! Loopback HTTP server answering with canned JSON responses.

#![allow(dead_code)]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A running canned server. Each accepted connection gets the next response.
pub struct CannedHttp {
    pub base_url: String,
    requests: JoinHandle<Vec<String>>,
}

impl CannedHttp {
    /// Binds `127.0.0.1:0` and serves `responses` in order, one per
    /// connection.
    pub async fn serve(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind loopback listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let requests = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.expect("Failed to accept");
                seen.push(read_request(&mut socket).await);

                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                socket
                    .write_all(response.as_bytes())
                    .await
                    .expect("Failed to write response");
                let _ = socket.shutdown().await;
            }
            seen
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    /// Raw requests received, once every response has been served.
    pub async fn requests(self) -> Vec<String> {
        self.requests.await.expect("Canned server panicked")
    }
}

/// Reads the head and, when `Content-Length` says so, the body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("Failed to read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).into_owned();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let body_len = content_length(&text[..head_end]);
            if buf.len() >= head_end + 4 + body_len {
                return text;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        _ => "Error",
    }
}
