//! Relay hub: shared peer list, mirror document, WebSocket fan-out.
//!
//! ## Design
//! - `Hub`: `Arc<Mutex<HubState>>` shared by every connection task
//! - One `tokio::sync::broadcast` channel carries relayed patches to all peers
//! - Every text frame from any peer is relayed verbatim to all peers, the
//!   sender included. Binary frames holding UTF-8 are relayed as text
//! - The hub applies each relayed patch to a mirror [`LiveDocument`] so a late
//!   joiner can be sent a snapshot before live patches
//!
//! The mutex is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::document::LiveDocument;
use crate::patch::PatchStats;

pub type Hub = Arc<Mutex<HubState>>;

/// A connected WebSocket peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peer {
    pub id: String,
    /// Request path the peer upgraded on (`/markdown`, `/code`, ...).
    pub path: String,
    pub joined_at_ms: u64,
}

pub struct HubState {
    pub peers: Vec<Peer>,
    pub mirror: LiveDocument,
    pub replay_on_join: bool,
    pub relayed: u64,
    /// Clone a receiver from this for each new peer.
    pub broadcast_tx: broadcast::Sender<String>,
}

/// Snapshot served on `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubStatus {
    pub clients: usize,
    pub bytes: usize,
    pub lines: usize,
    pub relayed: u64,
}

// ---------------------------------------------------------------------------
// Constructor helpers
// ---------------------------------------------------------------------------

/// Create an empty hub. `capacity` is clamped to at least 1.
pub fn new_hub(capacity: usize, replay_on_join: bool) -> Hub {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    Arc::new(Mutex::new(HubState {
        peers: Vec::new(),
        mirror: LiveDocument::new(),
        replay_on_join,
        relayed: 0,
        broadcast_tx: tx,
    }))
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn lock(hub: &Hub) -> MutexGuard<'_, HubState> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Hub operations
// ---------------------------------------------------------------------------

/// Register a peer.
///
/// Returns the peer, its broadcast receiver, and the snapshot patch to send
/// first (if replay is on and the mirror is non-empty). Subscribing and
/// snapshotting happen under one lock, so no patch is both in the snapshot and
/// on the receiver, and none is in neither.
pub fn join(hub: &Hub, path: &str) -> (Peer, broadcast::Receiver<String>, Option<String>) {
    let mut state = lock(hub);
    let peer = Peer {
        id: uuid::Uuid::new_v4().to_string(),
        path: path.to_string(),
        joined_at_ms: now_ms(),
    };
    let rx = state.broadcast_tx.subscribe();
    let snapshot = if state.replay_on_join && !state.mirror.is_empty() {
        Some(state.mirror.snapshot_patch())
    } else {
        None
    };
    state.peers.push(peer.clone());
    (peer, rx, snapshot)
}

/// Remove a peer. Returns how many peers remain.
pub fn leave(hub: &Hub, peer_id: &str) -> usize {
    let mut state = lock(hub);
    state.peers.retain(|p| p.id != peer_id);
    state.peers.len()
}

/// Apply `patch` to the mirror and broadcast it to every peer.
pub fn relay(hub: &Hub, patch: String) -> PatchStats {
    let mut state = lock(hub);
    let stats = state.mirror.apply(&patch);
    state.relayed += 1;
    // No receivers is fine: nobody is watching yet.
    let _ = state.broadcast_tx.send(patch);
    stats
}

pub fn status(hub: &Hub) -> HubStatus {
    let state = lock(hub);
    HubStatus {
        clients: state.peers.len(),
        bytes: state.mirror.len(),
        lines: state.mirror.line_count(),
        relayed: state.relayed,
    }
}

// ---------------------------------------------------------------------------
// WebSocket handler
// ---------------------------------------------------------------------------

fn relay_from(hub: &Hub, peer: &Peer, patch: String) {
    let stats = relay(hub, patch);
    debug!(
        peer = %peer.id,
        inserted = stats.inserted,
        removed = stats.removed,
        missing = stats.missing,
        "patch relayed"
    );
}

/// Serve one upgraded connection until either side goes away.
pub async fn handle_ws(
    ws_stream: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    hub: Hub,
    path: String,
) {
    let (peer, mut hub_rx, snapshot) = join(&hub, &path);
    info!(peer = %peer.id, path = %peer.path, "client connected");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    if let Some(snapshot) = snapshot {
        debug!(peer = %peer.id, bytes = snapshot.len(), "sending snapshot");
        if ws_sink.send(WsMessage::Text(snapshot)).await.is_err() {
            leave(&hub, &peer.id);
            return;
        }
    }

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => relay_from(&hub, &peer, text),
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => relay_from(&hub, &peer, text),
                        Err(e) => debug!(
                            peer = %peer.id,
                            bytes = e.as_bytes().len(),
                            "dropping non-UTF-8 binary frame"
                        ),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping / pong
                    Some(Err(e)) => {
                        warn!(peer = %peer.id, "error reading WebSocket message: {e}");
                        break;
                    }
                }
            }

            bcast = hub_rx.recv() => {
                match bcast {
                    Ok(patch) => {
                        if let Err(e) = ws_sink.send(WsMessage::Text(patch)).await {
                            warn!(peer = %peer.id, "error broadcasting message: {e}");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(peer = %peer.id, skipped, "peer lagging, patches dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Flushes the close reply if the peer started the handshake.
    let _ = ws_sink.close().await;

    let remaining = leave(&hub, &peer.id);
    info!(peer = %peer.id, remaining, "client disconnected");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
