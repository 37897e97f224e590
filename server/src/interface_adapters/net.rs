// WebSocket connection layer: one reader, one writer, and one keepalive task
// per client. The reader forwards parsed messages to the hub queue; the
// writer drains the bounded outbound queue the hub publishes into.

use crate::frameworks::config::{
    MAX_FRAME_BYTES, OUTBOUND_QUEUE_CAPACITY, PING_INTERVAL, READ_DEADLINE, WRITE_DEADLINE,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::types::{HubEvent, Outbound};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use game_core::protocol::ClientMessage;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    // The connection keeps its hub-wide identity for its whole lifetime.
    let user_id = Uuid::new_v4();
    let span = info_span!("conn", %user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id).instrument(span))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (sink, stream) = socket.split();

    // The hub owns the only long-lived sender; it publishes with try_send and
    // drops the client when this queue fills up.
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_CAPACITY);

    if state
        .hub_tx
        .send(HubEvent::Register {
            user_id,
            outbound: out_tx.clone(),
        })
        .await
        .is_err()
    {
        warn!("hub unavailable; dropping connection");
        return;
    }
    info!("client connected");

    let writer = tokio::spawn(writer_task(sink, out_rx));
    // Keepalive only holds a weak sender: once the hub unregisters this
    // client the queue really closes and the writer shuts down, whether the
    // drop started here or in the hub.
    let keepalive = tokio::spawn(keepalive_task(out_tx.downgrade()));
    drop(out_tx);

    let stats = read_loop(stream, user_id, &state).await;

    let _ = state.hub_tx.send(HubEvent::Unregister { user_id }).await;
    keepalive.abort();
    let _ = writer.await;

    debug!(
        msgs_in = stats.msgs_in,
        bytes_in = stats.bytes_in,
        invalid_json = stats.invalid_json,
        oversized = stats.oversized,
        "connection stats"
    );
    info!("client disconnected");
}

#[derive(Debug, Default)]
struct ReadStats {
    msgs_in: u64,
    bytes_in: u64,
    invalid_json: u32,
    oversized: u32,
}

/// Reads frames until close, error, or an idle read deadline. Any inbound
/// frame (pongs included) refreshes the deadline.
async fn read_loop(mut stream: SplitStream<WebSocket>, user_id: Uuid, state: &AppState) -> ReadStats {
    let mut stats = ReadStats::default();
    let mut last_invalid_log = Instant::now() - LOG_THROTTLE;

    loop {
        let frame = match tokio::time::timeout(READ_DEADLINE, stream.next()).await {
            Err(_) => {
                info!("read deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                warn!(error = %e, "websocket recv error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                if text.len() > MAX_FRAME_BYTES {
                    stats.oversized += 1;
                    if should_log(&mut last_invalid_log) {
                        warn!(bytes = text.len(), "oversized frame dropped");
                    }
                    continue;
                }

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        if state
                            .hub_tx
                            .send(HubEvent::Message { user_id, msg })
                            .await
                            .is_err()
                        {
                            warn!("hub queue closed; disconnecting");
                            break;
                        }
                    }
                    Err(parse_err) => {
                        stats.invalid_json += 1;
                        if should_log(&mut last_invalid_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }
                        if stats.invalid_json > MAX_INVALID_JSON {
                            warn!("too many invalid messages; disconnecting");
                            break;
                        }
                    }
                }
            }
            Message::Binary(_) => {
                stats.invalid_json += 1;
                if should_log(&mut last_invalid_log) {
                    warn!("binary frame dropped");
                }
                if stats.invalid_json > MAX_INVALID_JSON {
                    break;
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }
    stats
}

/// Serializes and writes outbound frames with a per-write deadline. A failed
/// or timed-out write ends the task; the reader observes the closed socket.
async fn writer_task(mut sink: SplitSink<WebSocket, Message>, mut out_rx: mpsc::Receiver<Outbound>) {
    while let Some(out) = out_rx.recv().await {
        let frame = match out {
            Outbound::Message(msg) => match serde_json::to_string(&msg) {
                Ok(text) => Message::Text(text.into()),
                Err(e) => {
                    warn!(error = %e, "failed to serialize server message");
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Vec::new().into()),
        };

        match tokio::time::timeout(WRITE_DEADLINE, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "websocket send error");
                break;
            }
            Err(_) => {
                warn!("write deadline expired");
                break;
            }
        }
    }
    let _ = sink.close().await;
}

/// Posts a protocol ping into the outbound queue on a fixed cadence so idle
/// clients keep refreshing their read deadline with pongs.
async fn keepalive_task(out_tx: mpsc::WeakSender<Outbound>) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(tx) = out_tx.upgrade() else {
            break;
        };
        match tx.try_send(Outbound::Ping) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Queue is saturated; the hub will drop this client shortly.
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}
