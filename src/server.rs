use std::future::Future;
use std::time::Duration;

use colored::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{LiveError, Result};
use crate::hub::{self, Hub};

/// Bytes peeked when sniffing for a WebSocket upgrade.
const PEEK_BUF_SIZE: usize = 4096;
const PEEK_BACKOFF: Duration = Duration::from_millis(10);
/// A connection that has not sent a full request head by then is dropped.
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Embedded viewer page. Derives its WebSocket endpoint from its own location
/// and applies patches with the same rules as [`crate::patch::apply`].
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Live Buffer</title>
<script src="https://cdn.jsdelivr.net/npm/marked/marked.min.js"></script>
<style>
  body { background: #0d1117; color: #c9d1d9; font-family: -apple-system, "Segoe UI", sans-serif; margin: 0; }
  #content { max-width: 860px; margin: 0 auto; padding: 24px 32px; line-height: 1.6; }
  #content pre, #content code { background: #161b22; border-radius: 6px; }
  #content pre { padding: 12px; overflow-x: auto; }
  #content a { color: #58a6ff; }
  #status { position: fixed; top: 8px; right: 12px; font-size: 12px; color: #8b949e; }
  #status.live { color: #3fb950; }
</style>
</head>
<body>
<div id="status">connecting</div>
<main id="content"></main>
<script>
let content = "";

function escapeHtml(s) {
  return s.replace(/&/g, "&amp;").replace(/</g, "&lt;").replace(/>/g, "&gt;");
}

function render() {
  const el = document.getElementById("content");
  el.innerHTML = typeof marked !== "undefined"
    ? marked.parse(content)
    : "<pre>" + escapeHtml(content) + "</pre>";
}

function applyPatch(patch) {
  for (const line of patch.split("\n")) {
    if (line.startsWith("+")) {
      content += line.slice(1) + "\n";
    } else if (line.startsWith("-")) {
      const needle = line.slice(1) + "\n";
      const at = content.indexOf(needle);
      if (at !== -1) {
        content = content.slice(0, at) + content.slice(at + needle.length);
      }
    }
  }
  render();
}

const scheme = window.location.protocol === "https:" ? "wss" : "ws";
const socket = new WebSocket(`${scheme}://${window.location.host}${window.location.pathname}`);
const status = document.getElementById("status");

socket.onmessage = (event) => applyPatch(event.data);
socket.onopen = () => {
  console.log("Connected to WebSocket");
  status.textContent = "live";
  status.className = "live";
};
socket.onerror = (error) => console.error("WebSocket Error:", error);
socket.onclose = () => {
  console.log("WebSocket connection closed");
  status.textContent = "disconnected";
  status.className = "";
};
</script>
</body>
</html>"##;

// ---------------------------------------------------------------------------
// Request head
// ---------------------------------------------------------------------------

/// The parts of an HTTP request head the router needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub websocket: bool,
    /// Length of the head in bytes, terminating blank line included.
    pub len: usize,
}

impl RequestHead {
    /// Parse a request head. `Ok(None)` means more bytes are needed.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>> {
        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        let len = match req.parse(buf)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };
        let method = req.method.unwrap_or("GET").to_string();
        let target = req.path.unwrap_or("/");
        let path = target.split('?').next().unwrap_or("/").to_string();
        let websocket = req.headers.iter().any(|h| {
            h.name.eq_ignore_ascii_case("upgrade")
                && std::str::from_utf8(h.value)
                    .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
                    .unwrap_or(false)
        });
        Ok(Some(Self {
            method,
            path,
            websocket,
            len,
        }))
    }
}

/// Peek until a full request head is buffered, leaving the bytes in the socket
/// for the WebSocket handshake to read. Gives up after `limit`, including on a
/// connection that never sends a byte.
async fn peek_head(stream: &TcpStream, limit: Duration) -> Result<RequestHead> {
    match tokio::time::timeout(limit, peek_until_head(stream)).await {
        Ok(head) => head,
        Err(_) => Err(LiveError::Http("timed out waiting for request head".into())),
    }
}

async fn peek_until_head(stream: &TcpStream) -> Result<RequestHead> {
    let mut buf = [0u8; PEEK_BUF_SIZE];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(LiveError::Http("connection closed before request".into()));
        }
        if let Some(head) = RequestHead::parse(&buf[..n])? {
            return Ok(head);
        }
        if n == buf.len() {
            return Err(LiveError::Http("request head too large".into()));
        }
        // peek returns at once while a partial head sits in the socket.
        tokio::time::sleep(PEEK_BACKOFF).await;
    }
}

// ---------------------------------------------------------------------------
// HTTP responses
// ---------------------------------------------------------------------------

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Build the response for a plain (non-upgrade) request.
pub fn respond(head: &RequestHead, hub: &Hub) -> Result<String> {
    if head.method != "GET" {
        return Ok(http_response(
            "405 Method Not Allowed",
            "text/plain",
            "Method Not Allowed",
        ));
    }
    let response = match head.path.as_str() {
        "/" | "/markdown" | "/code" => {
            http_response("200 OK", "text/html; charset=utf-8", INDEX_HTML)
        }
        "/status" => {
            let body = serde_json::to_string(&hub::status(hub))?;
            http_response("200 OK", "application/json", &body)
        }
        _ => http_response("404 Not Found", "text/plain", "Not Found"),
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// Server loop
// ---------------------------------------------------------------------------

pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    Ok(TcpListener::bind((config.host.as_str(), config.port)).await?)
}

/// Bind, print the port on stdout, and relay until Ctrl+C.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let listener = bind(config).await?;
    let addr = listener.local_addr()?;

    // Editor integrations read the port from the first stdout line.
    println!("{}", addr.port());
    eprintln!(
        "{}",
        format!("  Live buffer relay at http://{}", addr).bright_green()
    );
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());
    info!(%addr, "server started");

    let hub = hub::new_hub(config.channel_capacity, config.replay_on_join);
    run(listener, hub, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, hub: Hub, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down server");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, hub).await {
                        warn!(%peer_addr, "connection error: {e}");
                    }
                });
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, hub: Hub) -> Result<()> {
    let head = peek_head(&stream, REQUEST_HEAD_TIMEOUT).await?;
    debug!(method = %head.method, path = %head.path, websocket = head.websocket, "request");

    if head.websocket {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        hub::handle_ws(ws_stream, hub, head.path).await;
        return Ok(());
    }

    // Consume the head we only peeked at.
    let mut consumed = vec![0u8; head.len];
    stream.read_exact(&mut consumed).await?;

    let response = respond(&head, &hub)?;
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
