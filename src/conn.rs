use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::peer::{ConnId, Payload};
use crate::protocol;
use crate::state::Registry;

/// What the accept loop hands over to a session worker after registering the connection.
pub struct Session {
    pub id: ConnId,
    pub addr: SocketAddr,
    pub queue: mpsc::Receiver<Payload>,
    pub closed: CancellationToken,
}

/// Runs one connection: relays everything it sends, then deregisters it and
/// announces the departure. Errors end this session only.
pub async fn handle(registry: Registry, socket: TcpStream, session: Session, read_chunk: usize) {
    let Session {
        id,
        addr,
        queue,
        closed,
    } = session;

    let (mut reader, writer) = socket.into_split();
    let writer_task = tokio::spawn(write_queued(id, writer, queue, closed.clone()));

    let mut buf = vec![0u8; read_chunk.max(1)];

    loop {
        let read = tokio::select! {
            _ = closed.cancelled() => {
                debug!(conn = %id, "close requested");
                break;
            }
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!(conn = %id, "peer closed the connection");
                break;
            }
            Ok(n) => {
                let chunk = &buf[..n];
                info!(
                    conn = %id,
                    "connection {}: {}",
                    id,
                    String::from_utf8_lossy(chunk).trim_end()
                );
                registry.broadcast(protocol::relayed(id, chunk), Some(id));
            }
            Err(e) => {
                warn!(conn = %id, %addr, "read failed: {e}");
                break;
            }
        }
    }

    // Draining: out of the registry first so the departure never reaches us.
    registry.deregister(id);
    info!(conn = %id, %addr, "connection {} has left the chat", id);
    registry.broadcast(protocol::left(id), None);

    // Deregistering dropped the last queue sender, so the writer finishes once
    // it has flushed what was already queued.
    if let Err(e) = writer_task.await {
        warn!(conn = %id, "writer task failed: {e}");
    }
}

async fn write_queued(
    id: ConnId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Payload>,
    closed: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = closed.cancelled() => break,
            next = queue.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        let written = tokio::select! {
            _ = closed.cancelled() => break,
            written = writer.write_all(&payload) => written,
        };

        if let Err(e) = written {
            warn!(conn = %id, "write failed: {e}");
            break;
        }
    }

    // The socket may already be gone; closing twice is fine.
    let _ = writer.shutdown().await;
}
