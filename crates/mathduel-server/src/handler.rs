//! Per-connection handler: socket accept, frame decode, action dispatch.
//!
//! Each accepted socket gets its own task running [`handle_connection`].
//! A second task owns the write half; acks and room broadcasts funnel
//! through one channel per connection, so a client always observes its ack
//! and the resulting broadcasts in a consistent order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use mathduel_protocol::{AckBody, Codec, ConnId, JsonCodec, Request, ServerFrame};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::service::{App, FrameSender};
use crate::ServerError;

/// Counter for unique connection ids, never reused within the process.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Handles one connection from accept to close.
pub(crate) async fn handle_connection(
    app: Arc<App>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn = ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%conn, %peer, "accepted WebSocket connection");

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    app.register_connection(conn, tx.clone()).await;

    // Writer task: sole owner of the sink. A send failure just ends the
    // task — the read loop notices the close on its side.
    let writer = tokio::spawn(async move {
        let codec = JsonCodec;
        while let Some(frame) = rx.recv().await {
            let bytes = match codec.encode(&frame) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = source.next().await {
        match msg {
            Ok(Message::Binary(data)) => dispatch(&app, conn, &tx, &data).await,
            Ok(Message::Text(text)) => dispatch(&app, conn, &tx, text.as_bytes()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong
            Err(e) => {
                tracing::debug!(%conn, error = %e, "recv error");
                break;
            }
        }
    }

    // Implicit disconnect: leave-room semantics plus timer cancellation.
    app.handle_disconnect(conn).await;
    writer.abort();
    Ok(())
}

/// Decodes one request and answers it with exactly one ack.
async fn dispatch(app: &Arc<App>, conn: ConnId, tx: &FrameSender, data: &[u8]) {
    let codec = JsonCodec;
    let request: Request = match codec.decode(data) {
        Ok(r) => r,
        Err(e) => {
            // No sequence number to echo — seq 0 marks an unpaired error.
            let reason = e.to_string();
            let reason = reason.strip_prefix("decode failed: ").unwrap_or(&reason);
            let body = if e.is_missing_field() {
                AckBody::error(ServerError::MissingField(reason.to_string()))
            } else {
                AckBody::error(reason)
            };
            let _ = tx.send(ServerFrame::Ack { seq: 0, body });
            return;
        }
    };

    let body = app.handle_action(conn, request.action).await;
    let _ = tx.send(ServerFrame::Ack {
        seq: request.seq,
        body,
    });
}
