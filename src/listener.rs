//! Listening socket and accept loop
//!
//! Binds the server socket and hands every accepted connection to its own
//! handler task, while the ChatServer actor runs alongside.

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::ChatServer;

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Bind the listening socket with address reuse and the configured backlog
pub fn bind(config: &ServerConfig) -> Result<TcpListener, AppError> {
    let addr = config.bind_addr()?;
    let bind_err = |source| AppError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(config.backlog).map_err(bind_err)
}

/// Run the chat server on an already bound listener
///
/// Only returns if the ChatServer actor stops, which is always treated as
/// fatal by the caller.
pub async fn serve(listener: TcpListener) -> Result<(), AppError> {
    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let mut server = tokio::spawn(ChatServer::new(cmd_rx).run());

    info!("ChatServer actor started");

    // Connection accept loop
    loop {
        tokio::select! {
            result = &mut server => {
                return match result {
                    Ok(Ok(())) => Err(AppError::Internal("chat server stopped".to_string())),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(AppError::Internal(format!("chat server task failed: {}", e))),
                };
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from IP {} and port {}.", addr.ip(), addr.port());
                    let cmd_tx = cmd_tx.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, cmd_tx).await {
                            error!("Connection handler error for {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let listener = bind(&config).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_reports_address_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };
        let err = bind(&config).unwrap_err();
        assert!(matches!(err, AppError::Bind { .. }));
    }
}
