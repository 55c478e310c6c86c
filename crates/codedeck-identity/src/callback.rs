//! Local HTTP receiver for the provider's authentication redirect.
//!
//! The provider sends the browser back to `/auth/callback` with either
//! `code` and `state` or `error` and `error_description`. This server
//! accepts one such request, answers with a small HTML page, and hands the
//! parsed outcome to the caller.

use crate::{AuthError, AuthResult};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use url::Url;

/// Default time to wait for the redirect before giving up.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;

/// Parsed result of the authentication redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Provider issued an authorization code.
    Code {
        code: String,
        state: Option<String>,
    },
    /// Provider reported an error (e.g. `access_denied`).
    Denied {
        error: String,
        description: Option<String>,
    },
}

/// Callback server configuration; call [`CallbackServer::bind`] to listen.
pub struct CallbackServer {
    port: u16,
    timeout_secs: u64,
}

impl CallbackServer {
    /// Create a callback server for the given port. Port 0 picks a free
    /// port, which [`BoundCallbackServer::port`] reports after binding.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }

    /// Override the wait timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Bind the listener. Binding is separate from waiting so the caller
    /// can print the redirect URL only once the port is actually held.
    pub async fn bind(self) -> AuthResult<BoundCallbackServer> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(port = port, "callback receiver listening");
        Ok(BoundCallbackServer {
            listener,
            port,
            timeout_secs: self.timeout_secs,
        })
    }
}

/// A callback server that holds its port and is ready to wait.
pub struct BoundCallbackServer {
    listener: TcpListener,
    port: u16,
    timeout_secs: u64,
}

impl BoundCallbackServer {
    /// The port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the redirect and return its outcome.
    ///
    /// Serves at most one callback; stray requests to other paths get 404.
    /// Times out with [`AuthError::Timeout`] if the user never completes
    /// the provider flow.
    pub async fn wait(self) -> AuthResult<CallbackOutcome> {
        let (tx, rx) = oneshot::channel::<CallbackOutcome>();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let listener = self.listener;
        let server_handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(&mut socket, tx).await {
                                error!(error = %err, "error handling callback connection");
                            }
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "callback accept error");
                        break;
                    }
                }
            }
        });

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(AuthError::Callback("callback channel closed".to_string())),
            Err(_) => Err(AuthError::Timeout),
        };

        server_handle.abort();
        outcome
    }
}

async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "callback request");

    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/auth/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    let outcome = match parse_callback_query(path) {
        Some(outcome) => outcome,
        None => CallbackOutcome::Denied {
            error: "invalid_callback".to_string(),
            description: Some("missing code parameter".to_string()),
        },
    };

    match &outcome {
        CallbackOutcome::Code { .. } => {
            send_response(&mut writer, 200, "OK", &success_page()).await?;
        }
        CallbackOutcome::Denied { error, .. } => {
            send_response(&mut writer, 200, "OK", &error_page(error)).await?;
        }
    }

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(outcome);
    }

    Ok(())
}

/// Parse the callback path's query into an outcome. `None` means no code
/// and no error parameter was present.
fn parse_callback_query(path: &str) -> Option<CallbackOutcome> {
    // Relative request path; any base will do for query parsing.
    let url = Url::parse(&format!("http://localhost{}", path)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(CallbackOutcome::Denied { error, description });
    }
    code.map(|code| CallbackOutcome::Code { code, state })
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>CodeDeck - Signed In</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Signed in</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>CodeDeck - Sign In Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Sign in failed</h1>
<p>Error: {}</p>
<p>You can close this window and try again.</p>
</body>
</html>"#,
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_and_state() {
        let outcome = parse_callback_query("/auth/callback?code=abc123&state=xyz").unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Code {
                code: "abc123".to_string(),
                state: Some("xyz".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_code_without_state() {
        let outcome = parse_callback_query("/auth/callback?code=abc123").unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Code {
                code: "abc123".to_string(),
                state: None,
            }
        );
    }

    #[test]
    fn test_parse_error_route() {
        let outcome = parse_callback_query(
            "/auth/callback?error=access_denied&error_description=User%20refused",
        )
        .unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Denied {
                error: "access_denied".to_string(),
                description: Some("User refused".to_string()),
            }
        );
    }

    #[test]
    fn test_error_wins_over_code() {
        // A malformed redirect carrying both is treated as denied.
        let outcome =
            parse_callback_query("/auth/callback?code=abc&error=server_error").unwrap();
        assert!(matches!(outcome, CallbackOutcome::Denied { .. }));
    }

    #[test]
    fn test_parse_empty_query() {
        assert_eq!(parse_callback_query("/auth/callback"), None);
        assert_eq!(parse_callback_query("/auth/callback?foo=bar"), None);
    }

    #[tokio::test]
    async fn test_bound_server_reports_port() {
        let bound = CallbackServer::new(0).bind().await.unwrap();
        assert_ne!(bound.port(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_code_callback() {
        let bound = CallbackServer::new(0).with_timeout_secs(5).bind().await.unwrap();
        let port = bound.port();

        let wait = tokio::spawn(bound.wait());

        let body = reqwest::get(format!(
            "http://127.0.0.1:{}/auth/callback?code=abc123&state=s1",
            port
        ))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
        assert!(body.contains("Signed in"));

        let outcome = wait.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Code {
                code: "abc123".to_string(),
                state: Some("s1".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_end_to_end_denied_callback() {
        let bound = CallbackServer::new(0).with_timeout_secs(5).bind().await.unwrap();
        let port = bound.port();

        let wait = tokio::spawn(bound.wait());

        reqwest::get(format!(
            "http://127.0.0.1:{}/auth/callback?error=access_denied",
            port
        ))
        .await
        .unwrap();

        let outcome = wait.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Denied {
                error: "access_denied".to_string(),
                description: None,
            }
        );
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let bound = CallbackServer::new(0).with_timeout_secs(0).bind().await.unwrap();
        match bound.wait().await {
            Err(AuthError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }
}
