//! One-shot HTTP responder for exercising the client against canned
//! replies.

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as seen by [`respond_once`].
#[derive(Debug)]
pub struct Received {
    /// Request line and headers, up to and including the blank line.
    pub head: String,
    pub body: String,
}

impl Received {
    /// Value of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Accepts a single connection on a loopback port and answers it with
/// `status` (e.g. `"401 Unauthorized"`) and `body`.
///
/// Returns the base URL to point an [`crate::ApiConfig`] at, and a handle
/// resolving to the request that was received.
pub async fn respond_once(
    status: &'static str,
    content_type: &'static str,
    body: &'static str,
) -> (String, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        let head_len = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head ended");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let mut received = Received {
            head: String::from_utf8_lossy(&buf[..head_len]).into_owned(),
            body: String::new(),
        };
        let content_length = received
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < head_len + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        received.body = String::from_utf8_lossy(&buf[head_len..]).into_owned();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        received
    });

    (base_url, handle)
}
