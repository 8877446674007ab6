//! ChatServer Actor implementation
//!
//! The central actor that owns all shared state: the session registry and
//! the active connection set. Connection handlers talk to it only through
//! `ServerCommand`s, so no locks are needed.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::dispatch::{self, Delivery};
use crate::error::{AppError, ProtocolError};
use crate::message::{Frame, Notice};
use crate::registry::Registry;
use crate::types::{ClientId, Username};

/// Why a connection left the active set
#[derive(Debug)]
pub enum DisconnectReason {
    /// Peer closed its end on a frame boundary
    Closed,
    /// Read failed at the transport level
    Transport(String),
    /// Peer sent bytes the decoder cannot resynchronise after
    Violation(ProtocolError),
    /// Writer task ended (write failed or the server dropped the queue)
    WriterClosed,
    /// Server stopped accepting commands
    ServerGone,
}

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Handshake: admit a connection under the name from its first frame
    Join {
        client_id: ClientId,
        addr: SocketAddr,
        name: String,
        sender: mpsc::UnboundedSender<Bytes>,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    /// A decoded frame from an admitted connection
    Frame { client_id: ClientId, frame: Frame },
    /// Recoverable protocol violation from an admitted connection
    Violation {
        client_id: ClientId,
        error: ProtocolError,
    },
    /// Connection is gone
    Disconnect {
        client_id: ClientId,
        reason: DisconnectReason,
    },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Username directory; also the broadcast order
    registry: Registry,
    /// Active connections: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: Registry::new(),
            clients: HashMap::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until all senders are dropped. Returns an error
    /// only when internal state can no longer be trusted.
    pub async fn run(mut self) -> Result<(), AppError> {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd)?;
        }

        info!("ChatServer shutting down");
        Ok(())
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) -> Result<(), AppError> {
        match cmd {
            ServerCommand::Join {
                client_id,
                addr,
                name,
                sender,
                reply,
            } => self.handle_join(client_id, addr, name, sender, reply),
            ServerCommand::Frame { client_id, frame } => self.handle_frame(client_id, frame),
            ServerCommand::Violation { client_id, error } => {
                self.handle_violation(client_id, error);
                Ok(())
            }
            ServerCommand::Disconnect { client_id, reason } => {
                self.handle_disconnect(client_id, reason)
            }
        }
    }

    /// Handle the handshake of a new connection
    fn handle_join(
        &mut self,
        client_id: ClientId,
        addr: SocketAddr,
        name: String,
        sender: mpsc::UnboundedSender<Bytes>,
        reply: oneshot::Sender<Result<(), AppError>>,
    ) -> Result<(), AppError> {
        let admitted = Username::parse(name).and_then(|username| {
            self.registry
                .register(client_id, username.clone())
                .map(|()| username)
        });

        let username = match admitted {
            Ok(username) => username,
            Err(err @ AppError::Internal(_)) => return Err(err),
            Err(err) => {
                info!("The connection from {} was rejected: {}", addr, err);
                let _ = reply.send(Err(err));
                return Ok(());
            }
        };

        if reply.send(Ok(())).is_err() {
            // Handler is gone already
            self.registry.unregister(client_id);
            return Ok(());
        }

        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));
        info!("{} joined from {} as client {}", username, addr, client_id);
        debug!("Total clients: {}", self.clients.len());

        let notice = Notice::joined(&username);
        info!("{}", notice.as_str());
        self.deliver(vec![Delivery::Everyone(notice)])
    }

    /// Handle a frame from an admitted connection
    fn handle_frame(&mut self, client_id: ClientId, frame: Frame) -> Result<(), AppError> {
        match dispatch::dispatch(&mut self.registry, client_id, frame) {
            Ok(deliveries) => self.deliver(deliveries),
            Err(AppError::UnknownClient(id)) => {
                // Evicted while its handler was still reading
                debug!("Dropping frame from unregistered client {}", id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn handle_violation(&self, client_id: ClientId, error: ProtocolError) {
        match self.registry.name_of(client_id) {
            Some(name) => warn!(
                "Error: an incoming message from {} did not conform to the protocol: {}",
                name, error
            ),
            None => warn!(
                "Error: an incoming message from client {} did not conform to the protocol: {}",
                client_id, error
            ),
        }
    }

    /// Handle a connection leaving, for whatever reason
    fn handle_disconnect(
        &mut self,
        client_id: ClientId,
        reason: DisconnectReason,
    ) -> Result<(), AppError> {
        let deliveries = self.remove_client(client_id, reason);
        self.deliver(deliveries)
    }

    /// Purge a connection from the active set and the registry
    ///
    /// Dropping the `Client` drops the last sender of its writer queue,
    /// which lets the writer task finish and close the socket.
    fn remove_client(&mut self, client_id: ClientId, reason: DisconnectReason) -> Vec<Delivery> {
        let client = self.clients.remove(&client_id);
        let Some(name) = self.registry.unregister(client_id) else {
            debug!("Client {} already removed ({:?})", client_id, reason);
            return Vec::new();
        };

        let addr = client
            .map(|c| c.addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match &reason {
            DisconnectReason::Closed => {
                info!("{} ({}) closed the connection", name, addr);
            }
            DisconnectReason::Violation(err) => warn!(
                "Error: an incoming message from {} did not conform to the protocol: {}; closing",
                name, err
            ),
            other => warn!(
                "The socket of {} ({}) has encountered an error and has been closed: {:?}",
                name, addr, other
            ),
        }
        debug!("Total clients: {}", self.clients.len());

        let notice = Notice::left(&name);
        info!("{}", notice.as_str());
        vec![Delivery::Everyone(notice)]
    }

    /// Encode and queue notices
    ///
    /// Each notice is encoded once and the same bytes are handed to every
    /// recipient. Recipients whose writer task has gone are evicted,
    /// which may produce further leave notices.
    fn deliver(&mut self, deliveries: Vec<Delivery>) -> Result<(), AppError> {
        let mut pending = deliveries;

        while !pending.is_empty() {
            let mut gone: Vec<ClientId> = Vec::new();

            for delivery in pending.drain(..) {
                let (targets, notice): (Vec<ClientId>, Notice) = match delivery {
                    Delivery::Everyone(notice) => (self.registry.clients().collect(), notice),
                    Delivery::To(id, notice) => (vec![id], notice),
                };

                let bytes = match notice.encode() {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("Dropping notice that cannot be framed: {}", err);
                        continue;
                    }
                };

                for id in targets {
                    let Some(client) = self.clients.get(&id) else {
                        if self.registry.name_of(id).is_some() {
                            return Err(AppError::Internal(format!(
                                "client {} registered but not active",
                                id
                            )));
                        }
                        continue;
                    };
                    if let Err(err) = client.send(bytes.clone()) {
                        debug!("Send to client {} failed: {}", id, err);
                        if !gone.contains(&id) {
                            gone.push(id);
                        }
                    }
                }
            }

            for id in gone {
                pending.extend(self.remove_client(id, DisconnectReason::WriterClosed));
            }
        }

        Ok(())
    }
}
