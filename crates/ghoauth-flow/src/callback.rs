//! Transient loopback HTTP endpoint for the OAuth redirect.
//!
//! The provider redirects the browser to `http://127.0.0.1:{port}/?code=..&state=..`.
//! [`CallbackListener`] binds an ephemeral port, answers every request it
//! receives, and hands the first authorization code whose `state` matches
//! the flow's token to the orchestrator over a one-shot channel.
//!
//! Requests that do not qualify (favicon requests, forged or stale `state`,
//! redirects without a code) are answered with an error status and logged,
//! but nothing is delivered: the orchestrator keeps waiting.
//!
//! There is no HTTP framework here. A raw [`tokio::net::TcpListener`] is
//! enough for a GET request line.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{AuthError, Result};

/// Browsers request this on their own; it is never the real callback.
const FAVICON_PATH: &str = "/favicon.ico";

/// Pause after an accept error that is not specific to one peer.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on the request head we are willing to buffer.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// The HTML page returned to the browser after a successful callback.
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorization Successful</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f5f5f5;
            color: #333;
        }
        .card {
            text-align: center;
            padding: 3rem;
            background: white;
            border-radius: 12px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
        }
        h1 { color: #22c55e; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Success</h1>
        <p>Authorized. You can close this tab and return to the terminal.</p>
    </div>
</body>
</html>"#;

type CodeSender = Arc<Mutex<Option<oneshot::Sender<String>>>>;

// ---------------------------------------------------------------------------
// Request evaluation
// ---------------------------------------------------------------------------

/// Why a callback request was answered without delivering a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRejection {
    /// The browser asked for `/favicon.ico`.
    Favicon,
    /// The `state` parameter is missing or differs from the flow's token.
    StateMismatch,
    /// The `state` matched but no `code` was supplied.
    MissingCode,
    /// The request line could not be parsed.
    Malformed,
}

impl CallbackRejection {
    /// HTTP status line for this rejection.
    fn status(self) -> &'static str {
        match self {
            Self::Favicon => "404 Not Found",
            Self::StateMismatch | Self::MissingCode => "500 Internal Server Error",
            Self::Malformed => "400 Bad Request",
        }
    }
}

/// Result of looking at one callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A code arrived with the expected state.
    Code(String),
    /// The request is noise or forged; answer it and keep waiting.
    Rejected(CallbackRejection),
}

/// Decide what a request for `target` (path plus query) means for a flow
/// whose state token is `expected_state`.
pub fn evaluate(target: &str, expected_state: &str) -> CallbackOutcome {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path == FAVICON_PATH {
        return CallbackOutcome::Rejected(CallbackRejection::Favicon);
    }

    let mut state = None;
    let mut code = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "state" if state.is_none() => state = Some(value.into_owned()),
            "code" if code.is_none() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return CallbackOutcome::Rejected(CallbackRejection::StateMismatch);
    }

    match code {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => CallbackOutcome::Rejected(CallbackRejection::MissingCode),
    }
}

/// Extract the request target from the request line.
///
/// Expected format: `GET /some/path?code=xxx&state=yyy HTTP/1.1`
fn request_target(head: &str) -> Option<&str> {
    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    let _version = parts.next()?;
    target.starts_with('/').then_some(target)
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A loopback HTTP listener that receives one OAuth redirect.
///
/// Dropping the listener aborts its accept loop, which closes the socket and
/// every in-flight connection. This happens on every exit path of the flow,
/// including errors and cancellation of the awaiting future.
#[derive(Debug)]
pub struct CallbackListener {
    addr: SocketAddr,
    code_rx: oneshot::Receiver<String>,
    task: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind to an OS-assigned port on `127.0.0.1` and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the TCP listener cannot bind.
    pub async fn bind(expected_state: &str) -> Result<Self> {
        Self::bind_to(SocketAddr::from(([127, 0, 0, 1], 0)), expected_state).await
    }

    /// Bind to `addr` and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Io`] if the TCP listener cannot bind.
    pub async fn bind_to(addr: SocketAddr, expected_state: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        tracing::info!(addr = %addr, "callback listener waiting for OAuth redirect");

        let (code_tx, code_rx) = oneshot::channel();
        let code_tx: CodeSender = Arc::new(Mutex::new(Some(code_tx)));
        let task = tokio::spawn(serve(listener, Arc::from(expected_state), code_tx));

        Ok(Self {
            addr,
            code_rx,
            task,
        })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The URL the provider should redirect to.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the first valid authorization code, then shut down.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CallbackTimeout`] if `timeout` elapses first.
    /// - [`AuthError::ListenerClosed`] if the accept loop died.
    pub async fn wait_for_code(mut self, timeout: Option<Duration>) -> Result<String> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.code_rx)
                .await
                .map_err(|_| AuthError::CallbackTimeout {
                    timeout_secs: limit.as_secs(),
                })?,
            None => (&mut self.code_rx).await,
        };

        let code = received.map_err(|_| AuthError::ListenerClosed)?;
        tracing::info!("authorization code received, closing callback listener");
        Ok(code)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Accept loop. Each connection is served on its own task so an idle
/// speculative browser connection cannot hold up the real redirect.
async fn serve(listener: TcpListener, expected_state: Arc<str>, code_tx: CodeSender) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(peer = %peer, "accepted callback connection");
                    connections.spawn(handle_connection(
                        stream,
                        Arc::clone(&expected_state),
                        Arc::clone(&code_tx),
                    ));
                }
                Err(e) => {
                    let backoff = accept_backoff(&e);
                    tracing::warn!(error = %e, ?backoff, "callback listener failed to accept connection");
                    if let Some(delay) = backoff {
                        tokio::time::sleep(delay).await;
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// How long to pause after a failed `accept()` before trying again.
///
/// A connection that died before it was accepted only affects that peer.
/// Anything else (usually running out of file descriptors) gets a short
/// pause so the loop does not spin while the condition lasts.
fn accept_backoff(error: &std::io::Error) -> Option<Duration> {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted => {
            None
        }
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

async fn handle_connection(mut stream: TcpStream, expected_state: Arc<str>, code_tx: CodeSender) {
    let head = match read_request_head(&mut stream).await {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read callback request");
            return;
        }
    };

    let (path, outcome) = match request_target(&head) {
        Some(target) => (
            target.split('?').next().unwrap_or(target).to_string(),
            evaluate(target, &expected_state),
        ),
        None => (
            String::new(),
            CallbackOutcome::Rejected(CallbackRejection::Malformed),
        ),
    };

    let written = match &outcome {
        CallbackOutcome::Code(_) => write_response(&mut stream, "200 OK", SUCCESS_HTML).await,
        CallbackOutcome::Rejected(rejection) => {
            write_response(&mut stream, rejection.status(), "").await
        }
    };
    if let Err(e) = written {
        tracing::warn!(error = %e, "failed to write callback response");
    }

    match outcome {
        CallbackOutcome::Code(code) => {
            let Some(tx) = code_tx.lock().await.take() else {
                tracing::debug!("authorization code already delivered, ignoring repeat callback");
                return;
            };
            if tx.send(code).is_err() {
                tracing::debug!("flow stopped waiting before the code arrived");
            }
        }
        CallbackOutcome::Rejected(CallbackRejection::Favicon) => {
            tracing::debug!("ignored favicon request");
        }
        CallbackOutcome::Rejected(CallbackRejection::StateMismatch) => {
            tracing::error!(path = %path, "callback state doesn't match, rejecting request");
        }
        CallbackOutcome::Rejected(CallbackRejection::MissingCode) => {
            let provider_error = request_target(&head)
                .and_then(|t| t.split_once('?'))
                .and_then(|(_, q)| {
                    url::form_urlencoded::parse(q.as_bytes())
                        .find(|(k, _)| k == "error")
                        .map(|(_, v)| v.into_owned())
                });
            tracing::error!(path = %path, provider_error = ?provider_error, "no code in callback");
        }
        CallbackOutcome::Rejected(CallbackRejection::Malformed) => {
            tracing::warn!("malformed callback request");
        }
    }
}

/// Read until the end of the request head so the client never sees a reset
/// caused by closing a socket with unread data.
async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_valid_callback() {
        assert_eq!(
            evaluate("/?state=X&code=ABC", "X"),
            CallbackOutcome::Code("ABC".to_string())
        );
    }

    #[test]
    fn evaluate_any_path_is_accepted() {
        assert_eq!(
            evaluate("/callback?code=c123&state=s456&session_state=zz", "s456"),
            CallbackOutcome::Code("c123".to_string())
        );
    }

    #[test]
    fn evaluate_percent_encoded_values() {
        assert_eq!(
            evaluate("/?code=abc%20def&state=123%2B456", "123+456"),
            CallbackOutcome::Code("abc def".to_string())
        );
    }

    #[test]
    fn evaluate_state_mismatch() {
        assert_eq!(
            evaluate("/?state=Y&code=ABC", "X"),
            CallbackOutcome::Rejected(CallbackRejection::StateMismatch)
        );
    }

    #[test]
    fn evaluate_missing_state() {
        assert_eq!(
            evaluate("/?code=ABC", "X"),
            CallbackOutcome::Rejected(CallbackRejection::StateMismatch)
        );
    }

    #[test]
    fn evaluate_missing_code() {
        assert_eq!(
            evaluate("/?state=X", "X"),
            CallbackOutcome::Rejected(CallbackRejection::MissingCode)
        );
        assert_eq!(
            evaluate("/?state=X&code=", "X"),
            CallbackOutcome::Rejected(CallbackRejection::MissingCode)
        );
        assert_eq!(
            evaluate("/?error=access_denied&state=X", "X"),
            CallbackOutcome::Rejected(CallbackRejection::MissingCode)
        );
    }

    #[test]
    fn evaluate_favicon_wins_over_params() {
        assert_eq!(
            evaluate("/favicon.ico?state=X&code=ABC", "X"),
            CallbackOutcome::Rejected(CallbackRejection::Favicon)
        );
    }

    #[test]
    fn evaluate_first_value_wins() {
        assert_eq!(
            evaluate("/?state=X&state=Y&code=one&code=two", "X"),
            CallbackOutcome::Code("one".to_string())
        );
    }

    #[test]
    fn request_target_parsing() {
        assert_eq!(
            request_target("GET /?code=a&state=b HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some("/?code=a&state=b")
        );
        assert_eq!(request_target(""), None);
        assert_eq!(request_target("NOTHTTP"), None);
        assert_eq!(request_target("GET http://evil/ HTTP/1.1\r\n"), None);
    }

    #[test]
    fn rejection_statuses() {
        assert!(CallbackRejection::Favicon.status().starts_with("404"));
        assert!(CallbackRejection::StateMismatch.status().starts_with("500"));
        assert!(CallbackRejection::MissingCode.status().starts_with("500"));
        assert!(CallbackRejection::Malformed.status().starts_with("400"));
    }

    #[test]
    fn accept_errors_are_retried() {
        use std::io::{Error, ErrorKind};

        assert_eq!(accept_backoff(&Error::from(ErrorKind::ConnectionAborted)), None);
        assert_eq!(accept_backoff(&Error::from(ErrorKind::ConnectionReset)), None);
        // EMFILE has no dedicated kind.
        assert_eq!(
            accept_backoff(&Error::other("too many open files")),
            Some(ACCEPT_ERROR_BACKOFF)
        );
    }

    #[tokio::test]
    async fn listener_redirect_uri_is_loopback() {
        let listener = CallbackListener::bind("state").await.unwrap();
        let addr = listener.local_addr();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(listener.redirect_uri(), format!("http://127.0.0.1:{}", addr.port()));
    }

    #[tokio::test]
    async fn listener_times_out_without_callback() {
        let listener = CallbackListener::bind("state").await.unwrap();
        let err = listener
            .wait_for_code(Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CallbackTimeout { timeout_secs: 0 }));
    }

    #[tokio::test]
    async fn listener_delivers_code_over_raw_socket() {
        let listener = CallbackListener::bind("st8").await.unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /?code=test_code_42&state=st8 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        let code = listener
            .wait_for_code(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(code, "test_code_42");

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Success"));
    }

    #[test]
    fn callback_listener_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CallbackListener>();
    }
}
