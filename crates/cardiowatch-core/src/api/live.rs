//! Live channel: WebSocket upgrade, per-connection tasks and heartbeat

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::live::{ConnectionRegistry, LiveSession, PushFrame, SessionOutbox};

use super::handlers::AppState;

const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// Query parameters on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct LiveQuery {
    /// Identity the connection receives pushes for
    pub identity: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// Connections without an identity are accepted but never registered, so
/// they receive nothing.
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> impl IntoResponse {
    let identity = query
        .identity
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty());

    ws.on_upgrade(move |socket| {
        handle_socket(socket, state.registry, identity, state.session_buffer)
    })
}

async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    identity: Option<String>,
    buffer: usize,
) {
    let (session, outbox) = LiveSession::open(buffer);
    let session_id = session.id();
    info!(session_id = %session_id, identity = ?identity, "Live connection opened");

    if let Some(identity) = &identity {
        registry.register(identity.clone(), session.clone());
    }

    let (sink, mut stream) = socket.split();
    let send_task = tokio::spawn(write_frames(sink, outbox, session_id));

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                trace!(session_id = %session_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Live receive error");
                break;
            }
        }
    }

    if let Some(identity) = &identity {
        registry.release(identity, session_id);
    }
    send_task.abort();
    let connected_secs = (chrono::Utc::now() - session.connected_at()).num_seconds();
    info!(
        session_id = %session_id,
        identity = ?identity,
        connected_secs,
        "Live connection closed"
    );
}

async fn write_frames<S>(mut sink: S, mut outbox: SessionOutbox, session_id: uuid::Uuid)
where
    S: futures::Sink<Message> + Unpin,
{
    while let Some(frame) = outbox.recv().await {
        let (message, last) = match frame {
            PushFrame::Text(text) => (Message::Text(text.to_string()), false),
            PushFrame::Ping => (Message::Ping(Vec::new()), false),
            PushFrame::Close => (Message::Close(None), true),
        };

        if sink.send(message).await.is_err() {
            debug!(session_id = %session_id, "Live sink closed");
            break;
        }
        if last {
            break;
        }
    }
}

/// Spawn a task that pings every registered session on `interval`.
///
/// A zero interval is raised to one millisecond.
pub fn start_heartbeat(registry: Arc<ConnectionRegistry>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_HEARTBEAT);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let pinged = registry.ping_all();
            debug!(pinged, sessions = registry.len(), "Live heartbeat");
        }
    })
}
