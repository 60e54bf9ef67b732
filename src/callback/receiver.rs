//! Local OAuth callback receiver
//!
//! Listens on a loopback port for the redirect that ends an authorization,
//! the same job the client under test does when it runs its own callback
//! server. It serves one successful callback and then stops.
//!
//! Requests to other paths (a browser's `/favicon.ico`, or a garbled
//! request line) get a `404` and the receiver keeps waiting. Connections
//! that stay silent past [`REQUEST_READ_TIMEOUT`] or send more than
//! [`MAX_REQUEST_HEAD_BYTES`] of head are dropped without failing the wait.
//! A state mismatch or a missing code gets a `400` and fails the wait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use url::Url;

use crate::callback::dispatcher::CALLBACK_PATH;
use crate::error::{Result, SimError};

const SUCCESS_BODY: &str = "Authorization successful. You may close this tab.";

/// How long one connection may take to send its request line and headers.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on the request line plus headers.
pub const MAX_REQUEST_HEAD_BYTES: u64 = 16 * 1024;

/// Parameters delivered to the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    /// Authorization code
    pub code: String,
    /// CSRF state echoed back
    pub state: String,
}

/// One-shot loopback callback server.
#[derive(Debug)]
pub struct CallbackReceiver {
    listener: TcpListener,
    port: u16,
}

impl CallbackReceiver {
    /// Binds `127.0.0.1:port`. Use `0` for an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Callback`] if the port cannot be bound.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| SimError::Callback(format!("failed to bind callback port {port}: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| SimError::Callback(format!("failed to get local address: {e}")))?
            .port();
        tracing::debug!(port, "Callback receiver listening");
        Ok(Self { listener, port })
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://127.0.0.1:{port}/oauth/callback`.
    pub fn callback_url(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "http://127.0.0.1:{}{CALLBACK_PATH}",
            self.port
        ))?)
    }

    /// Waits for one callback on `/oauth/callback`.
    ///
    /// When `expected_state` is given the delivered `state` must match it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Callback`] on timeout, state mismatch, or a
    /// missing `code`.
    pub async fn wait_for_callback(
        self,
        expected_state: Option<&str>,
        timeout: Duration,
    ) -> Result<AuthorizationCallback> {
        match tokio::time::timeout(timeout, self.accept_loop(expected_state)).await {
            Ok(result) => result,
            Err(_) => Err(SimError::Callback(format!(
                "no callback received within {}ms",
                timeout.as_millis()
            ))
            .into()),
        }
    }

    async fn accept_loop(&self, expected_state: Option<&str>) -> Result<AuthorizationCallback> {
        let expected_state: Option<Arc<str>> = expected_state.map(Arc::from);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        SimError::Callback(format!("failed to accept callback connection: {e}"))
                    })?;
                    tracing::debug!(%peer, "Callback connection accepted");
                    connections.spawn(handle_connection(stream, expected_state.clone()));
                }

                Some(joined) = connections.join_next() => match joined {
                    Ok(Ok(Some(callback))) => return Ok(callback),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => tracing::debug!("Callback connection task failed: {}", e),
                },
            }
        }
    }
}

/// Reads one request. Returns `Ok(None)` for requests that are not the
/// callback.
async fn handle_connection(
    stream: TcpStream,
    expected_state: Option<Arc<str>>,
) -> Result<Option<AuthorizationCallback>> {
    let (read_half, mut write_half) = stream.into_split();

    let request_line =
        match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_line(read_half)).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                tracing::debug!("Dropping unreadable callback connection: {}", e);
                return Ok(None);
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = REQUEST_READ_TIMEOUT.as_millis() as u64,
                    "Dropping idle callback connection"
                );
                return Ok(None);
            }
        };

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path != CALLBACK_PATH {
        write_response(&mut write_half, 404, "Not Found").await;
        return Ok(None);
    }

    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let state = params.get("state").cloned().unwrap_or_default();
    if let Some(expected) = expected_state {
        if state != *expected {
            write_response(&mut write_half, 400, "State mismatch").await;
            return Err(SimError::Callback("state mismatch in OAuth callback".to_string()).into());
        }
    }

    let code = match params.get("code") {
        Some(code) if !code.is_empty() => code.clone(),
        _ => {
            write_response(&mut write_half, 400, "Missing authorization code").await;
            return Err(SimError::Callback(
                "authorization code missing from callback".to_string(),
            )
            .into());
        }
    };

    write_response(&mut write_half, 200, SUCCESS_BODY).await;
    tracing::info!("OAuth callback received");
    Ok(Some(AuthorizationCallback { code, state }))
}

/// Reads the request line and drains headers up to the blank line.
///
/// Bytes are decoded lossily, and the head is capped at
/// [`MAX_REQUEST_HEAD_BYTES`]; a head that hits the cap is an error.
async fn read_request_line<R>(stream: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_HEAD_BYTES));
    let mut buf = Vec::new();

    reader.read_until(b'\n', &mut buf).await?;
    if !buf.ends_with(b"\n") {
        return Err(truncated_head());
    }
    let request_line = String::from_utf8_lossy(&buf).into_owned();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 || buf.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        if !buf.ends_with(b"\n") {
            return Err(truncated_head());
        }
    }

    Ok(request_line)
}

fn truncated_head() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "request head truncated or too large",
    )
}

async fn write_response(stream: &mut OwnedWriteHalf, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Not Found",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to write callback response: {}", e);
    }
    let _ = stream.shutdown().await;
}
