//! Viewer side of the relay: connect once, feed every message to a
//! [`PatchHandler`], stop when the channel closes.
//!
//! There is no reconnection. A dropped connection ends the session with the
//! document as it was; the caller decides what to do next.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{LiveError, Result};
use crate::handler::PatchHandler;

/// What a finished watch session saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub patches: u64,
    /// Frames that were neither text nor UTF-8 binary.
    pub ignored: u64,
}

/// Derive the WebSocket endpoint from a page location.
///
/// `http` maps to `ws`, `https` to `wss`; host, port and path are kept and
/// query and fragment are dropped. `ws`/`wss` locations pass through.
pub fn endpoint_from_location(location: &str) -> Result<Url> {
    let invalid = |reason: String| LiveError::InvalidEndpoint {
        location: location.to_string(),
        reason,
    };

    let mut url = Url::parse(location).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("missing host".into()));
    }
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to scheme '{scheme}'")))?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Join command-line patch records into one payload.
pub fn join_records<S: AsRef<str>>(records: &[S]) -> String {
    records
        .iter()
        .map(|r| r.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Connect to `endpoint` and apply every inbound message until the channel
/// closes or errors.
///
/// Connect failures and render failures are returned. Errors on an
/// established channel are logged and end the session normally.
pub async fn watch(endpoint: &Url, handler: &mut PatchHandler) -> Result<WatchSummary> {
    let (mut ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
    info!(%endpoint, "connected to live buffer");

    let mut summary = WatchSummary::default();
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                handler.on_message(&text)?;
                summary.patches += 1;
            }
            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    handler.on_message(&text)?;
                    summary.patches += 1;
                }
                Err(_) => {
                    debug!("ignoring non-UTF-8 binary frame");
                    summary.ignored += 1;
                }
            },
            Ok(WsMessage::Close(frame)) => {
                info!(?frame, "connection closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error: {e}");
                break;
            }
        }
    }

    info!(patches = summary.patches, "live buffer session ended");
    Ok(summary)
}

/// Send one patch to `endpoint`, then close.
///
/// Returns after the close handshake, so the relay has taken the patch by the
/// time this resolves.
pub async fn push(endpoint: &Url, patch: &str) -> Result<()> {
    let (mut ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
    ws.send(WsMessage::Text(patch.to_string())).await?;
    ws.close(None).await?;
    while let Some(frame) = ws.next().await {
        if frame.is_err() {
            break;
        }
    }
    debug!(%endpoint, bytes = patch.len(), "patch pushed");
    Ok(())
}
