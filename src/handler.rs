//! TCP connection handler
//!
//! Handles individual client connections: welcome notice, name handshake,
//! frame decoding, and bidirectional communication with the ChatServer.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::codec::ClientFrameCodec;
use crate::error::AppError;
use crate::message::{Frame, Notice};
use crate::server::{DisconnectReason, ServerCommand};
use crate::types::ClientId;

/// How long a single socket write may block before the peer counts as stalled
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

type FrameReader = FramedRead<OwnedReadHalf, ClientFrameCodec>;

/// Handle a new TCP connection
///
/// Sends the welcome notice, performs the name handshake, then relays
/// frames to the ChatServer until either direction of the connection ends.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let client_id = ClientId::new();
    debug!("Client {} accepted from {}", client_id, addr);

    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, ClientFrameCodec);

    // Create channel for server -> client bytes
    let (msg_tx, msg_rx) = mpsc::unbounded_channel::<Bytes>();
    let mut write_task = tokio::spawn(write_notices(
        client_id,
        write_half,
        msg_rx,
        WRITE_TIMEOUT,
    ));

    msg_tx
        .send(Notice::welcome().encode()?)
        .map_err(|_| AppError::ChannelSend)?;

    // The first frame must name the connection
    let name = match frames.next().await {
        Some(Ok(Ok(Frame::Rename { name }))) => name,
        Some(Ok(Ok(_))) => {
            return reject(addr, msg_tx, write_task, AppError::HandshakeExpected).await;
        }
        Some(Ok(Err(violation))) => {
            return reject(addr, msg_tx, write_task, violation.into()).await;
        }
        Some(Err(err)) => return reject(addr, msg_tx, write_task, err).await,
        None => {
            info!("The connection from {} closed before sending a name.", addr);
            return Ok(());
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::Join {
            client_id,
            addr,
            name,
            sender: msg_tx.clone(),
            reply: reply_tx,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    if let Err(err) = reply_rx.await.map_err(|_| AppError::ChannelSend)? {
        return reject(addr, msg_tx, write_task, err).await;
    }

    // From here on the server holds the only sender; dropping it there
    // ends the writer task.
    drop(msg_tx);

    let reason = tokio::select! {
        reason = read_frames(client_id, &mut frames, &cmd_tx) => reason,
        _ = &mut write_task => DisconnectReason::WriterClosed,
    };

    debug!("Client {} leaving: {:?}", client_id, reason);
    let _ = cmd_tx
        .send(ServerCommand::Disconnect { client_id, reason })
        .await;

    Ok(())
}

/// Relay frames to the server until the connection stops yielding them
async fn read_frames(
    client_id: ClientId,
    frames: &mut FrameReader,
    cmd_tx: &mpsc::Sender<ServerCommand>,
) -> DisconnectReason {
    while let Some(result) = frames.next().await {
        let cmd = match result {
            Ok(Ok(frame)) => {
                debug!("Client {}: received {:?}", client_id, frame);
                ServerCommand::Frame { client_id, frame }
            }
            Ok(Err(error)) => ServerCommand::Violation { client_id, error },
            Err(AppError::Protocol(err)) => return DisconnectReason::Violation(err),
            Err(err) => return DisconnectReason::Transport(err.to_string()),
        };
        if cmd_tx.send(cmd).await.is_err() {
            debug!("Server closed, ending read loop for {}", client_id);
            return DisconnectReason::ServerGone;
        }
    }
    DisconnectReason::Closed
}

/// Write queued bytes to the socket until the queue closes, a write fails,
/// or a write makes no progress within `write_timeout`
async fn write_notices<W>(
    client_id: ClientId,
    mut writer: W,
    mut msg_rx: mpsc::UnboundedReceiver<Bytes>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = msg_rx.recv().await {
        match timeout(write_timeout, writer.write_all(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write to client {} failed: {}", client_id, e);
                break;
            }
            Err(_) => {
                warn!("Client {} stopped reading; closing its connection", client_id);
                break;
            }
        }
    }
    debug!("Write task ended for {}", client_id);

    let _ = writer.shutdown().await;
}

/// Tell a connection why it was refused, then close it
async fn reject(
    addr: SocketAddr,
    msg_tx: mpsc::UnboundedSender<Bytes>,
    write_task: JoinHandle<()>,
    err: AppError,
) -> Result<(), AppError> {
    info!("The connection from {} was rejected: {}", addr, err);

    let notice = match err {
        AppError::NameTaken(_) | AppError::NameInvalid(_) => Notice::rejection(err),
        other => Notice::from(other),
    };
    let _ = msg_tx.send(notice.encode()?);

    // Let the writer drain and close the socket
    drop(msg_tx);
    let _ = write_task.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_writer_drains_burst_in_order() {
        let (client_side, server_side) = tokio::io::duplex(64);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        for i in 0..1000 {
            msg_tx
                .send(Notice(format!("{:03}", i)).encode().unwrap())
                .unwrap();
        }
        drop(msg_tx);

        let writer = tokio::spawn(write_notices(
            ClientId::new(),
            server_side,
            msg_rx,
            Duration::from_secs(5),
        ));

        let mut received = Vec::new();
        let mut reader = client_side;
        reader.read_to_end(&mut received).await.unwrap();
        writer.await.unwrap();

        assert_eq!(received.len(), 1000 * 8);
        assert_eq!(&received[..8], b"00003000");
        assert_eq!(&received[received.len() - 8..], b"00003999");
    }

    #[tokio::test]
    async fn test_writer_gives_up_on_peer_that_never_reads() {
        let (_client_side, server_side) = tokio::io::duplex(16);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        msg_tx
            .send(Notice("x".repeat(64)).encode().unwrap())
            .unwrap();

        let writer = tokio::spawn(write_notices(
            ClientId::new(),
            server_side,
            msg_rx,
            Duration::from_millis(50),
        ));

        // Ends on its own even though the queue is still open
        tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .expect("writer did not time out")
            .unwrap();
        drop(msg_tx);
    }
}
