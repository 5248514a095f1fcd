//! Realtime WebSocket channel.
//!
//! Lives alongside the HTTP path and never shares its queue: realtime is
//! inbound-only. One task owns the connection, authenticates, decodes
//! typed events into the dispatcher, and reconnects on a fixed delay for
//! as long as the client runs.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wareflow_core::WarehouseId;
use wareflow_events::{EventDispatcher, RealtimeEvent};

/// Fixed wait between reconnect attempts. Deliberately not exponential:
/// the channel is advisory and a stale dashboard beats a long dark gap.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    Shutdown,
    Closed,
}

/// Derive the websocket endpoint from the HTTP base URL.
pub(crate) fn websocket_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    };
    format!("{ws}/ws")
}

pub(crate) fn spawn_realtime_channel(
    base_url: String,
    token: String,
    warehouse_id: WarehouseId,
    dispatcher: Arc<EventDispatcher>,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let url = websocket_url(&base_url);
        tracing::info!("Realtime channel connecting to {}", url);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                conn = connect_async(&url) => match conn {
                    Ok((stream, _)) => {
                        let end =
                            run_connection(stream, &token, warehouse_id, &dispatcher, &shutdown)
                                .await;
                        if end == ConnectionEnd::Shutdown {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Realtime connect failed: {}", e),
                }
            }

            tokio::select! {
                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        tracing::info!("Realtime channel stopped");
    })
}

/// Authenticate, then decode inbound events until the connection ends or
/// shutdown is signaled.
async fn run_connection(
    stream: WsStream,
    token: &str,
    warehouse_id: WarehouseId,
    dispatcher: &EventDispatcher,
    shutdown: &Notify,
) -> ConnectionEnd {
    let (mut sink, mut source) = stream.split();

    let hello = json!({
        "type": "auth",
        "token": token,
        "warehouseId": warehouse_id,
    });
    if let Err(e) = sink.send(Message::text(hello.to_string())).await {
        tracing::warn!("Realtime auth send failed: {}", e);
        return ConnectionEnd::Closed;
    }
    tracing::info!("Realtime channel connected");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = sink.send(Message::Close(None)).await;
                return ConnectionEnd::Shutdown;
            }
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => dispatch_text(&text, dispatcher),
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Realtime server closed the connection");
                    return ConnectionEnd::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Realtime read error: {}", e);
                    return ConnectionEnd::Closed;
                }
            }
        }
    }
}

fn dispatch_text(text: &str, dispatcher: &EventDispatcher) {
    match serde_json::from_str::<RealtimeEvent>(text) {
        Ok(event) => {
            if let Err(e) = dispatcher.publish(event) {
                tracing::warn!("Realtime dispatch failed: {}", e);
            }
        }
        // Unknown event types are expected as the backend grows.
        Err(e) => tracing::debug!("Ignoring unrecognized realtime message: {}", e),
    }
}
