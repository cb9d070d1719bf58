//! WebSocket upgrade and per-connection read/write loops.
//!
//! Each socket is split: a writer task owns the sink and drains the
//! connection's outbound queue, and the read loop turns inbound frames into
//! registry transitions (pong → liveness, close/error → teardown).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastHub;
use super::connection::{ClientConnection, Outbound};
use super::registry::ConnectionRegistry;
use crate::metrics::WS_DISCONNECTIONS_TOTAL;
use crate::server::AppState;

/// Upper bound on delivering the final Close frame.
pub(crate) const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);
/// How long teardown waits for the writer before aborting it.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// GET /ws
///
/// A connection slot is reserved before upgrading and held for the life of
/// the socket; when none is free the upgrade is refused with 503.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(slot) = state.slots.try_acquire() else {
        warn!(
            max = state.slots.limit(),
            "refusing websocket upgrade, connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let max_size = state.config.max_message_size;
    let queue_capacity = state.config.send_queue_capacity;
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_upgrade(move |socket| async move {
            handle_socket(socket, state.hub, queue_capacity).await;
            drop(slot);
        })
}

/// Drive one upgraded socket until it closes or is evicted.
#[instrument(skip_all, fields(conn_id))]
pub async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>, queue_capacity: usize) {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let connection = Arc::new(ClientConnection::new(tx));
    let id = hub.on_connect(Arc::clone(&connection));
    let _ = tracing::Span::current().record("conn_id", id.as_str());
    info!("client connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, rx, connection.close_token()));

    let writer_done = tokio::select! {
        _ = &mut writer => true,
        () = read_loop(stream, &connection, hub.registry()) => false,
    };

    let _ = connection.begin_close();
    let _ = hub.registry().unregister(&connection);
    if !writer_done && time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        warn!("writer did not stop after close, aborting");
        writer.abort();
    }

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(
        age_ms = connection.age().as_millis() as u64,
        dropped = connection.drop_count(),
        "client disconnected"
    );
}

/// Forward queued frames to the socket, in queue order, until closed.
///
/// Every write races the close signal, so a peer that stopped reading cannot
/// pin the task once the connection is removed. On close a Close frame is
/// attempted for at most [`CLOSE_FRAME_TIMEOUT`] and the sink is dropped,
/// releasing the transport.
pub(crate) async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    close: CancellationToken,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            () = close.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(Outbound::Text(text)) => Message::Text(text.as_str().into()),
                Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                None => return,
            },
        };
        tokio::select! {
            biased;
            () = close.cancelled() => {
                debug!("abandoning pending write on close");
                break;
            }
            sent = sink.send(message) => {
                if sent.is_err() {
                    debug!("websocket write failed");
                    return;
                }
            }
        }
    }

    if time::timeout(CLOSE_FRAME_TIMEOUT, sink.send(Message::Close(None)))
        .await
        .is_err()
    {
        debug!("close frame not delivered, dropping transport");
    }
}

/// Consume inbound frames until the peer leaves, the transport fails, or the
/// connection is closed from our side.
pub(crate) async fn read_loop<S>(
    mut stream: S,
    connection: &ClientConnection,
    registry: &ConnectionRegistry,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let close = connection.close_token();
    loop {
        let next = tokio::select! {
            () = close.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Pong(_))) => {
                let _ = registry.mark_liveness(&connection.id, true);
            }
            Some(Ok(Message::Close(_))) | None => {
                let _ = connection.begin_close();
                break;
            }
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "ignoring inbound text frame");
            }
            // pings are answered by the transport
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket transport error");
                let _ = connection.begin_close();
                break;
            }
        }
    }
}
