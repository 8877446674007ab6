//! Multi-user TCP Chat Server Library
//!
//! A chat server speaking a small length-prefixed text protocol over TCP,
//! built on tokio using the Actor pattern for state management.
//!
//! # Features
//! - Name handshake with unique display names
//! - Broadcast and direct messages
//! - Renaming, online-user listing and help
//! - Join / leave notices
//! - A terminal client speaking the same protocol
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the session registry
//! - Each connection has a `handler` task decoding frames with `FramedRead`,
//!   so a slow peer only ever holds up its own task
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use framed_chat::{bind, serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = bind(&ServerConfig::default()).unwrap();
//!     serve(listener).await.unwrap();
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod input;
pub mod listener;
pub mod logging;
pub mod message;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use codec::{ClientFrameCodec, NoticeCodec};
pub use config::{ClientConfig, ServerConfig};
pub use dispatch::{dispatch, Delivery};
pub use error::{AppError, InputError, ProtocolError, SendError};
pub use handler::handle_connection;
pub use listener::{bind, serve};
pub use message::{Frame, Notice};
pub use registry::Registry;
pub use server::{ChatServer, DisconnectReason, ServerCommand};
pub use types::{ClientId, Username};
