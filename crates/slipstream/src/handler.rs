//! Per-connection reader and writer tasks.
//!
//! Each accepted connection gets two tasks:
//!
//! - the **reader** (this function's own loop) pulls frames off the
//!   socket and feeds them to the hub, stopping when the hub reports
//!   the connection closed or the socket dies;
//! - the **writer** drains the connection's bounded outbound queue into
//!   the socket, so a slow peer never blocks the hub's broadcasts.
//!
//! The first frame must arrive within the handshake timeout. Cleanup is
//! a drop guard: however the reader exits, the connection is
//! unregistered, which also drops the hub-held sender and lets the
//! writer run to its natural end.

use std::sync::Arc;
use std::time::Duration;

use slipstream_hub::{Hub, Outcome, OutboundFrame};
use slipstream_protocol::CloseCode;
use slipstream_store::KeyedStore;
use slipstream_transport::{Connection, ConnectionId, WebSocketConnection};

/// Drop guard that unregisters the connection when the reader exits.
///
/// `Drop` is synchronous, so the async unregister is spawned
/// fire-and-forget. It runs even if the reader panics.
struct ConnGuard<S: KeyedStore> {
    id: ConnectionId,
    hub: Arc<Hub<S>>,
}

impl<S: KeyedStore> Drop for ConnGuard<S> {
    fn drop(&mut self) {
        let id = self.id;
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            hub.unregister(id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: KeyedStore>(
    conn: WebSocketConnection,
    hub: Arc<Hub<S>>,
    handshake_timeout: Duration,
) {
    let conn = Arc::new(conn);
    let (outbound, mut queue) = hub.outbound_channel();
    let id = hub.register(outbound).await;
    tracing::debug!(%id, transport = %conn.id(), "handling new connection");

    // Writer task: a failed send is this connection's own death, routed
    // through the same unregister path a dropped socket takes. A close
    // frame closes the transport and ends the task.
    let writer_conn = Arc::clone(&conn);
    let writer_hub = Arc::clone(&hub);
    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            match frame {
                OutboundFrame::Data(bytes) => {
                    if let Err(e) = writer_conn.send(&bytes).await {
                        tracing::debug!(%id, error = %e, "send failed");
                        writer_hub.unregister(id).await;
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    // Close failures are swallowed; the connection is
                    // already considered gone.
                    let _ =
                        writer_conn.close(code.as_u16(), &reason).await;
                    break;
                }
            }
        }
    });

    let _guard = ConnGuard {
        id,
        hub: Arc::clone(&hub),
    };

    let mut awaiting_hello = true;
    loop {
        let received = if awaiting_hello {
            match tokio::time::timeout(handshake_timeout, conn.recv()).await
            {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(%id, "handshake timed out");
                    hub.force_close(
                        id,
                        CloseCode::CannotAccept,
                        "handshake timeout",
                    )
                    .await;
                    break;
                }
            }
        } else {
            conn.recv().await
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                break;
            }
        };

        match hub.handle_message(id, &data).await {
            Outcome::Closed => break,
            Outcome::Continue | Outcome::Rejected(_) => {}
        }
        awaiting_hello = false;
    }

    // _guard drops here → unregister runs → the hub-held sender is
    // dropped → the writer drains and ends on its own.
    drop(writer);
}
