//! Client struct definition
//!
//! Represents an admitted connection in the server's active set.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ClientId;

/// Active connection information
///
/// Holds the connection's ID, peer address and the channel feeding its
/// writer task. The username lives in the registry, not here.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Server → writer task byte channel
    pub sender: mpsc::UnboundedSender<Bytes>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { id, addr, sender }
    }

    /// Queue already-encoded bytes for this client
    ///
    /// Never waits. Fails only once the writer task has gone away; a peer
    /// that stops reading is detected by the writer's own timeout.
    pub fn send(&self, bytes: Bytes) -> Result<(), SendError> {
        self.sender
            .send(bytes)
            .map_err(|_| SendError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4615".parse().unwrap()
    }

    #[tokio::test]
    async fn test_client_send() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Client::new(ClientId::new(), addr(), tx);

        client.send(Bytes::from_static(b"00002hi")).unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"00002hi"));
    }

    #[tokio::test]
    async fn test_client_send_burst_is_not_refused() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Client::new(ClientId::new(), addr(), tx);

        for _ in 0..10_000 {
            client.send(Bytes::from_static(b"00001x")).unwrap();
        }

        let mut received = 0;
        while let Ok(bytes) = rx.try_recv() {
            assert_eq!(bytes, Bytes::from_static(b"00001x"));
            received += 1;
        }
        assert_eq!(received, 10_000);
    }

    #[tokio::test]
    async fn test_client_send_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::new(ClientId::new(), addr(), tx);
        drop(rx);

        let err = client.send(Bytes::from_static(b"00001a")).unwrap_err();

        assert!(matches!(err, SendError::ChannelClosed));
    }
}
